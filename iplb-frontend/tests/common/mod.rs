//! Test helpers: a mock API on an ephemeral port driven by the real client.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use iplb_frontend::{
    ApiConfig, FrontendReconciler, FrontendSpec, PortList, RestClient, RetryConfig, SweepConfig,
    Sweeper,
};
use iplb_mock::{MockServer, MockState};

pub const SERVICE: &str = "loadbalancer-test";
pub const PREFIX: &str = "tf-test-";

/// Mock server plus a reconciler pointed at it.
pub struct TestEnv {
    pub server: MockServer,
    pub reconciler: FrontendReconciler,
}

impl TestEnv {
    pub async fn start() -> Self {
        let state = MockState::with_services([SERVICE]).await;
        let server = MockServer::spawn(state)
            .await
            .expect("failed to start mock server");

        let config = ApiConfig::new(server.base_url()).with_timeout(Duration::from_secs(5));
        let client = RestClient::new(&config).expect("failed to build client");
        let reconciler = FrontendReconciler::new(Arc::new(client));

        Self { server, reconciler }
    }

    pub fn state(&self) -> &MockState {
        self.server.state()
    }

    pub fn sweeper(&self, service: Option<&str>) -> Sweeper {
        let config = SweepConfig::new(service.map(str::to_string))
            .with_prefix(PREFIX)
            .with_retry(fast_retry(Duration::from_secs(5)));
        Sweeper::new(self.reconciler.clone(), config)
    }
}

/// Retry schedule short enough for tests against a real socket.
pub fn fast_retry(budget: Duration) -> RetryConfig {
    RetryConfig {
        budget,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

pub fn frontend_path(id: i64) -> String {
    format!("/ipLoadbalancing/{}/http/frontend/{}", SERVICE, id)
}

/// `basic` acceptance config: one port, TLS on, disabled.
pub fn basic_spec(name: &str) -> FrontendSpec {
    FrontendSpec {
        display_name: Some(name.to_string()),
        ssl: true,
        disabled: true,
        ..FrontendSpec::new(SERVICE, "all", PortList::parse("22280").unwrap())
    }
}

/// `update` acceptance config: two ports, source filter and header injection.
pub fn updated_spec(name: &str) -> FrontendSpec {
    FrontendSpec {
        display_name: Some(name.to_string()),
        ssl: false,
        disabled: false,
        allowed_source: vec!["8.8.8.8/32".to_string()],
        http_header: vec![
            "X-Ip-Header %ci".to_string(),
            "X-Port-Header %cp".to_string(),
        ],
        ..FrontendSpec::new(SERVICE, "all", PortList::parse("22280,22443").unwrap())
    }
}

/// Frontend on its own port so several can coexist in one zone.
pub fn spec_on_port(name: &str, port: u16) -> FrontendSpec {
    FrontendSpec {
        display_name: Some(name.to_string()),
        ..FrontendSpec::new(SERVICE, "all", PortList::parse(&port.to_string()).unwrap())
    }
}
