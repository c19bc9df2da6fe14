mod enrollment;
mod event;
mod sequence;
mod step_run;
