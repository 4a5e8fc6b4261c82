//! In-memory connector for tests.
//!
//! Beans live in a shared table; failures and latency can be injected per
//! bean, per attribute or per call.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::connector::{
    ConnectionEnv, Connector, ConnectorError, ConnectorResult, MBeanAttributeInfo, MBeanInfo,
    MBeanServerConnection,
};
use crate::object_name::ObjectName;
use crate::value::RawValue;

#[derive(Debug, Default)]
struct Bean {
    name: Option<ObjectName>,
    attributes: BTreeMap<String, RawValue>,
    failing: BTreeMap<String, ConnectorError>,
    batch_failure: Option<ConnectorError>,
}

#[derive(Debug, Default)]
struct State {
    beans: BTreeMap<String, Bean>,
    refuse: Option<String>,
    next_failure: Option<ConnectorError>,
    delay: Option<Duration>,
    panic_on: HashSet<String>,
    connects: usize,
    open_sessions: usize,
    last_target: Option<String>,
    last_env: Option<ConnectionEnv>,
}

/// Connector backed by an in-memory bean table.
///
/// Clones share the same table, so a test can keep one clone for
/// configuration and hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    state: Arc<Mutex<State>>,
}

impl InMemoryConnector {
    /// Empty bean table accepting every connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a bean.
    ///
    /// # Panics
    ///
    /// Panics when `name` is not a valid bean name.
    pub fn add_bean<K, I>(&self, name: &str, attributes: I) -> &Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        let parsed = ObjectName::parse(name).unwrap_or_else(|e| panic!("bad test bean name: {e}"));
        let bean = Bean {
            attributes: attributes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            name: Some(parsed.clone()),
            ..Bean::default()
        };
        self.state.lock().beans.insert(parsed.canonical_name(), bean);
        self
    }

    fn with_bean(&self, name: &str, f: impl FnOnce(&mut Bean)) {
        let key = ObjectName::parse(name)
            .map(|n| n.canonical_name())
            .unwrap_or_else(|e| panic!("bad test bean name: {e}"));
        let mut state = self.state.lock();
        let bean = state
            .beans
            .get_mut(&key)
            .unwrap_or_else(|| panic!("unknown test bean {name}"));
        f(bean);
    }

    /// Make single reads of `attribute` on `bean` fail with `error`.
    /// Batched reads silently omit the attribute.
    pub fn fail_attribute(&self, bean: &str, attribute: &str, error: ConnectorError) -> &Self {
        self.with_bean(bean, |b| {
            b.failing.insert(attribute.to_string(), error);
        });
        self
    }

    /// Make batched reads on `bean` fail with `error`.
    pub fn fail_batch(&self, bean: &str, error: ConnectorError) -> &Self {
        self.with_bean(bean, |b| b.batch_failure = Some(error));
        self
    }

    /// Fail the next session call with `error`.
    pub fn fail_next_call(&self, error: ConnectorError) -> &Self {
        self.state.lock().next_failure = Some(error);
        self
    }

    /// Delay every session call.
    pub fn set_delay(&self, delay: Option<Duration>) -> &Self {
        self.state.lock().delay = delay;
        self
    }

    /// Panic while reading `attribute`.
    pub fn panic_on_attribute(&self, attribute: &str) -> &Self {
        self.state.lock().panic_on.insert(attribute.to_string());
        self
    }

    /// Refuse new connections with `message`.
    pub fn refuse_connections(&self, message: &str) -> &Self {
        self.state.lock().refuse = Some(message.to_string());
        self
    }

    /// Accept new connections again.
    pub fn accept_connections(&self) -> &Self {
        self.state.lock().refuse = None;
        self
    }

    /// Number of connection attempts so far.
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Number of sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }

    /// Target of the last connection attempt.
    pub fn last_target(&self) -> Option<String> {
        self.state.lock().last_target.clone()
    }

    /// Session settings of the last connection attempt.
    pub fn last_env(&self) -> Option<ConnectionEnv> {
        self.state.lock().last_env.clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(
        &self,
        target: &str,
        env: &ConnectionEnv,
    ) -> ConnectorResult<Box<dyn MBeanServerConnection>> {
        let mut state = self.state.lock();
        state.connects += 1;
        state.last_target = Some(target.to_string());
        state.last_env = Some(env.clone());

        if let Some(message) = &state.refuse {
            return Err(ConnectorError::io(message.clone()));
        }
        state.open_sessions += 1;

        Ok(Box::new(InMemorySession {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

#[derive(Debug)]
struct InMemorySession {
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl InMemorySession {
    /// Applies injected failure and latency; returns the delay to wait out.
    fn prologue(&self) -> ConnectorResult<Option<Duration>> {
        let mut state = self.state.lock();
        if self.closed {
            return Err(ConnectorError::io("session closed"));
        }
        if let Some(err) = state.next_failure.take() {
            return Err(err);
        }
        Ok(state.delay)
    }

    async fn enter(&self) -> ConnectorResult<()> {
        if let Some(delay) = self.prologue()? {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn not_found(name: &ObjectName) -> ConnectorError {
        ConnectorError::remote(
            "javax.management.InstanceNotFoundException",
            name.to_string(),
        )
    }
}

#[async_trait]
impl MBeanServerConnection for InMemorySession {
    async fn query_names(&mut self, pattern: &ObjectName) -> ConnectorResult<Vec<ObjectName>> {
        self.enter().await?;
        let state = self.state.lock();
        Ok(state
            .beans
            .values()
            .filter_map(|b| b.name.clone())
            .filter(|n| pattern.matches(n))
            .collect())
    }

    async fn get_mbean_info(&mut self, name: &ObjectName) -> ConnectorResult<MBeanInfo> {
        self.enter().await?;
        let state = self.state.lock();
        let bean = state
            .beans
            .get(&name.canonical_name())
            .ok_or_else(|| Self::not_found(name))?;

        Ok(MBeanInfo {
            class_name: "InMemoryBean".to_string(),
            description: String::new(),
            attributes: bean
                .attributes
                .iter()
                .map(|(attr, value)| MBeanAttributeInfo {
                    name: attr.clone(),
                    type_name: value.type_name().to_string(),
                    readable: true,
                })
                .collect(),
        })
    }

    async fn get_attribute(&mut self, name: &ObjectName, attribute: &str) -> ConnectorResult<RawValue> {
        self.enter().await?;
        let state = self.state.lock();
        if state.panic_on.contains(attribute) {
            panic!("attribute {attribute} exploded");
        }
        let bean = state
            .beans
            .get(&name.canonical_name())
            .ok_or_else(|| Self::not_found(name))?;
        if let Some(err) = bean.failing.get(attribute) {
            return Err(err.clone());
        }
        bean.attributes.get(attribute).cloned().ok_or_else(|| {
            ConnectorError::remote(
                "javax.management.AttributeNotFoundException",
                format!("No such attribute: {attribute}"),
            )
        })
    }

    async fn get_attributes(
        &mut self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ConnectorResult<Vec<(String, RawValue)>> {
        self.enter().await?;
        let state = self.state.lock();
        if let Some(attr) = attributes.iter().find(|a| state.panic_on.contains(a.as_str())) {
            panic!("attribute {attr} exploded");
        }
        let bean = state
            .beans
            .get(&name.canonical_name())
            .ok_or_else(|| Self::not_found(name))?;
        if let Some(err) = &bean.batch_failure {
            return Err(err.clone());
        }

        Ok(attributes
            .iter()
            .filter(|a| !bean.failing.contains_key(a.as_str()))
            .filter_map(|a| bean.attributes.get(a).map(|v| (a.clone(), v.clone())))
            .collect())
    }

    async fn close(&mut self) -> ConnectorResult<()> {
        if !self.closed {
            self.closed = true;
            let mut state = self.state.lock();
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
        Ok(())
    }
}
