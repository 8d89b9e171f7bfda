//! Shared test utilities and fixtures
//!
//! Every fixture runs against an in-memory `FakeDriver`, never a real `jj`.

#![allow(dead_code)]

use std::sync::Arc;

use jjgate::Host;
use jjgate_tools::testing::FakeDriver;
use jjgate_tools::{
    Admission, GateError, Gatekeeper, ToolCtx, ToolError, ToolRegistry, VcsConfig, VcsSettings,
    register_builtins,
};
use jjgate_types::{GateState, SessionId};
use serde_json::Value;

pub struct Harness {
    pub driver: Arc<FakeDriver>,
    pub gate: Arc<Gatekeeper>,
    pub tools: ToolRegistry,
}

impl Harness {
    pub fn new(driver: FakeDriver) -> Self {
        Self::with_settings(driver, VcsSettings::default())
    }

    /// Short timeouts for scenarios that make the driver hang.
    pub fn impatient(driver: FakeDriver) -> Self {
        Self::with_settings(
            driver,
            VcsSettings::from_config(&VcsConfig {
                timeout_ms: Some(100),
                ..VcsConfig::default()
            }),
        )
    }

    fn with_settings(driver: FakeDriver, settings: VcsSettings) -> Self {
        let driver = Arc::new(driver);
        let gate = Arc::new(Gatekeeper::new(driver.clone(), settings));
        let mut tools = ToolRegistry::default();
        register_builtins(&mut tools, &gate).expect("builtins register once");
        Self {
            driver,
            gate,
            tools,
        }
    }

    pub async fn create(&self, id: &str) -> GateState {
        self.gate.on_session_created(SessionId::new(id), None).await
    }

    pub async fn create_child(&self, id: &str, parent: &str) -> GateState {
        self.gate
            .on_session_created(SessionId::new(id), Some(SessionId::new(parent)))
            .await
    }

    pub async fn check(&self, id: &str, tool: &str) -> Result<Admission, GateError> {
        self.gate.check_tool(&SessionId::new(id), tool).await
    }

    pub async fn call(&self, id: &str, tool: &str, args: Value) -> Result<String, ToolError> {
        let mut ctx = ToolCtx::new(SessionId::new(id));
        self.tools.execute(tool, args, &mut ctx).await
    }

    pub async fn state(&self, id: &str) -> Option<GateState> {
        self.gate.state(&SessionId::new(id)).await
    }
}

pub fn host(driver: FakeDriver) -> (Arc<FakeDriver>, Host) {
    let driver = Arc::new(driver);
    let gate = Arc::new(Gatekeeper::new(driver.clone(), VcsSettings::default()));
    let host = Host::new(gate).expect("builtins register once");
    (driver, host)
}
