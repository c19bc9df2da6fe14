use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    Config, Engine, LeadflowError, Result,
    classifier::{FallbackClassifier, OpenAiClassifier, ResponseClassifier},
    gateway::Gateways,
    lead::{LeadDirectory, MemLeadDirectory},
    utils::time::{Clock, SystemClock},
};

/// Assembles an [`Engine`] from a config and its collaborators.
///
/// Anything not set falls back to what the config describes: HTTP gateways
/// for the configured providers, the OpenAI classifier when a key is
/// present, an empty in-memory lead directory and the system clock.
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    gateways: Option<Gateways>,
    classifier: Option<Arc<dyn ResponseClassifier>>,
    leads: Option<Arc<dyn LeadDirectory>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            gateways: None,
            classifier: None,
            leads: None,
            clock: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn gateways(
        mut self,
        gateways: Gateways,
    ) -> Self {
        self.gateways = Some(gateways);
        self
    }

    pub fn classifier(
        mut self,
        classifier: Arc<dyn ResponseClassifier>,
    ) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn leads(
        mut self,
        leads: Arc<dyn LeadDirectory>,
    ) -> Self {
        self.leads = Some(leads);
        self
    }

    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let runtime = match self.rt {
            Some(rt) => rt,
            None => {
                let threads = self.config.async_worker_thread_number.max(1);
                let rt = Builder::new_multi_thread()
                    .worker_threads(threads.into())
                    .enable_all()
                    .build()
                    .map_err(|e| LeadflowError::Runtime(format!("failed to build runtime: {}", e)))?;
                Arc::new(rt)
            }
        };

        let gateways = self.gateways.unwrap_or_else(|| Gateways::from_config(&self.config.gateways));
        let classifier: Arc<dyn ResponseClassifier> = match (self.classifier, &self.config.classifier.openai) {
            (Some(classifier), _) => classifier,
            (None, Some(openai)) => Arc::new(OpenAiClassifier::new(openai.clone())),
            (None, None) => Arc::new(FallbackClassifier),
        };
        let leads: Arc<dyn LeadDirectory> = match self.leads {
            Some(leads) => leads,
            None => Arc::new(MemLeadDirectory::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        Engine::new(&self.config, runtime, Arc::new(gateways), classifier, leads, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StoreType, config::StoreConfig};

    #[test]
    fn test_build_default() {
        let engine = EngineBuilder::new().async_worker_thread_number(1).build().unwrap();
        assert!(!engine.is_running());
        engine.launch();
        assert!(engine.is_running());
        engine.shutdown();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_build_postgres_without_url() {
        let config = Config {
            store: StoreConfig {
                store_type: StoreType::Postgres,
                postgres: None,
            },
            ..Default::default()
        };
        assert!(matches!(EngineBuilder::new().config(config).build(), Err(LeadflowError::Config(_))));
    }
}
