//! Controllers: control laws wired to nodes and edges through signals.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use twin_core::{ComponentId, KernelError, KernelResult, Schema, State, StateMap, StateValue};

use crate::component::{ModelParams, label, no_params};
use crate::signal::{
    ComponentKind, ConnectionRole, Endpoint, Payload, Signal, SignalRef, SignalRole,
};

/// Behaviour of a concrete controller type.
pub trait ControllerModel: fmt::Debug + Send {
    /// Registry name, persisted as `class`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Arc<Schema>;

    /// See [`NodeModel::params`](crate::NodeModel::params).
    fn params(&self) -> ModelParams {
        ModelParams::Null
    }

    fn configure(&mut self, params: &ModelParams) -> KernelResult<()> {
        no_params(self.type_name(), params)
    }

    /// Connection names this controller reads from.
    fn required_read(&self) -> &'static [&'static str] {
        &[]
    }

    /// Connection names this controller writes to.
    fn required_write(&self) -> &'static [&'static str] {
        &[]
    }

    /// Control law. Read signals already hold this tick's captures; writes
    /// are staged for the next tick.
    fn update(&mut self, _dt: f64, _io: &mut ControllerIo<'_>) -> KernelResult<()> {
        Ok(())
    }
}

/// Handle given to [`ControllerModel::update`].
#[derive(Debug)]
pub struct ControllerIo<'a> {
    label: &'a str,
    state: &'a mut State,
    reads: &'a BTreeMap<String, Signal>,
    writes: &'a mut BTreeMap<String, Signal>,
}

impl<'a> ControllerIo<'a> {
    pub fn state(&self) -> &State {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut *self.state
    }

    /// Full capture of the component connected as `name`.
    pub fn read(&self, name: &str) -> KernelResult<&Payload> {
        self.reads.get(name).map(Signal::read).ok_or_else(|| {
            KernelError::configuration(format!("{} has no read connection '{name}'", self.label))
        })
    }

    /// Dotted path into a capture, e.g. `"a"` or `"flows.a"`.
    pub fn read_value(&self, name: &str, path: &str) -> KernelResult<&StateValue> {
        let payload = self.read(name)?;
        let mut segments = path.split('.');
        let mut current = segments.next().and_then(|head| payload.get(head));
        for segment in segments {
            current = current
                .and_then(StateValue::as_record)
                .and_then(|record| record.get(segment));
        }
        current.ok_or_else(|| {
            KernelError::unknown_field(format!("{name}.{path}"), self.label.to_string())
        })
    }

    pub fn read_f64(&self, name: &str, path: &str) -> KernelResult<f64> {
        let value = self.read_value(name, path)?;
        value.as_f64().ok_or_else(|| KernelError::TypeMismatch {
            field: format!("{name}.{path}"),
            expected: "float",
            actual: value.kind_name(),
        })
    }

    /// Stage `payload` on the write connection `name`.
    pub fn write(&mut self, name: &str, payload: Payload) -> KernelResult<()> {
        let label = self.label;
        self.writes
            .get_mut(name)
            .ok_or_else(|| {
                KernelError::configuration(format!("{label} has no write connection '{name}'"))
            })?
            .write(payload)
    }

    /// Payload currently staged on `name`.
    pub fn staged(&self, name: &str) -> Option<&Payload> {
        self.writes.get(name).map(Signal::read)
    }
}

#[derive(Debug)]
pub struct Controller {
    id: ComponentId,
    name: Option<String>,
    state: State,
    model: Box<dyn ControllerModel>,
    connections_read: BTreeMap<String, Signal>,
    connections_write: BTreeMap<String, Signal>,
}

impl Controller {
    pub(crate) fn new(
        id: ComponentId,
        name: Option<String>,
        model: Box<dyn ControllerModel>,
        values: StateMap,
    ) -> KernelResult<Self> {
        let label = label(model.type_name(), id, name.as_deref());
        for names in [model.required_read(), model.required_write()] {
            let mut seen = BTreeSet::new();
            if let Some(dup) = names.iter().find(|n| !seen.insert(**n)) {
                return Err(KernelError::configuration(format!(
                    "{label} declares connection '{dup}' twice"
                )));
            }
        }
        let state = State::new(model.schema(), values).map_err(|e| e.within(&label))?;
        Ok(Self {
            id,
            name,
            state,
            model,
            connections_read: BTreeMap::new(),
            connections_write: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        self.model.type_name()
    }

    pub fn label(&self) -> String {
        label(self.type_name(), self.id, self.name())
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn model(&self) -> &dyn ControllerModel {
        self.model.as_ref()
    }

    pub fn connections_read(&self) -> &BTreeMap<String, Signal> {
        &self.connections_read
    }

    pub fn connections_write(&self) -> &BTreeMap<String, Signal> {
        &self.connections_write
    }

    /// Every attached connection with its role and peer id.
    pub fn connections(&self) -> BTreeMap<&str, (ConnectionRole, ComponentId)> {
        let mut out = BTreeMap::new();
        for (name, signal) in &self.connections_read {
            out.insert(name.as_str(), (ConnectionRole::Read, signal.peer().id));
        }
        for (name, signal) in &self.connections_write {
            out.entry(name.as_str())
                .and_modify(|entry: &mut (ConnectionRole, ComponentId)| {
                    entry.0 = ConnectionRole::Both
                })
                .or_insert((ConnectionRole::Write, signal.peer().id));
        }
        out
    }

    /// Contract names that have no connection yet.
    pub fn missing_connections(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = self
            .model
            .required_read()
            .iter()
            .filter(|n| !self.connections_read.contains_key(**n))
            .chain(
                self.model
                    .required_write()
                    .iter()
                    .filter(|n| !self.connections_write.contains_key(**n)),
            )
            .copied()
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Last capture of every read connection.
    pub fn snapshot(&self) -> BTreeMap<&str, &Payload> {
        self.connections_read
            .iter()
            .map(|(name, signal)| (name.as_str(), signal.read()))
            .collect()
    }

    /// Stage a write outside of a tick, e.g. an operator command or a
    /// payload restored from a document.
    pub fn stage(&mut self, name: &str, payload: Payload) -> KernelResult<()> {
        let label = self.label();
        self.connections_write
            .get_mut(name)
            .ok_or_else(|| {
                KernelError::configuration(format!("{label} has no write connection '{name}'"))
            })?
            .write(payload)
    }

    /// Role a contract assigns to `name`, if any.
    pub fn contract_role(&self, name: &str) -> Option<ConnectionRole> {
        let read = self.model.required_read().contains(&name);
        let write = self.model.required_write().contains(&name);
        match (read, write) {
            (true, true) => Some(ConnectionRole::Both),
            (true, false) => Some(ConnectionRole::Read),
            (false, true) => Some(ConnectionRole::Write),
            (false, false) => None,
        }
    }

    /// Create the signals for connection `name` towards `peer`.
    ///
    /// Returns the references the peer must register: read signals go to its
    /// outgoing list, write signals to its incoming list.
    pub(crate) fn attach(&mut self, name: &str, peer: Endpoint) -> KernelResult<Vec<SignalRef>> {
        let role = self.contract_role(name).ok_or_else(|| {
            KernelError::configuration(format!(
                "'{name}' is not a declared connection of {}",
                self.label()
            ))
        })?;
        if self.connections_read.contains_key(name) || self.connections_write.contains_key(name) {
            return Err(KernelError::configuration(format!(
                "connection '{name}' of {} is already attached",
                self.label()
            )));
        }

        let me = Endpoint::new(self.id, ComponentKind::Controller);
        let read = role
            .includes(SignalRole::Read)
            .then(|| Signal::new(peer, me))
            .transpose()?;
        let write = role
            .includes(SignalRole::Write)
            .then(|| Signal::new(me, peer))
            .transpose()?;

        let mut refs = Vec::new();
        if let Some(signal) = read {
            self.connections_read.insert(name.to_string(), signal);
            refs.push(self.signal_ref(name, SignalRole::Read));
        }
        if let Some(signal) = write {
            self.connections_write.insert(name.to_string(), signal);
            refs.push(self.signal_ref(name, SignalRole::Write));
        }
        Ok(refs)
    }

    /// Drop both signals of connection `name`.
    pub(crate) fn detach(&mut self, name: &str) {
        self.connections_read.remove(name);
        self.connections_write.remove(name);
    }

    fn signal_ref(&self, name: &str, role: SignalRole) -> SignalRef {
        SignalRef {
            controller: self.id,
            name: name.to_string(),
            role,
        }
    }

    /// Every signal as `(peer, reference)`.
    pub(crate) fn signal_refs(&self) -> Vec<(ComponentId, SignalRef)> {
        let reads = self
            .connections_read
            .iter()
            .map(|(name, s)| (s.peer().id, self.signal_ref(name, SignalRole::Read)));
        let writes = self
            .connections_write
            .iter()
            .map(|(name, s)| (s.peer().id, self.signal_ref(name, SignalRole::Write)));
        reads.chain(writes).collect()
    }

    pub(crate) fn update(&mut self, dt: f64, captures: BTreeMap<String, Payload>) -> KernelResult<()> {
        for (name, payload) in captures {
            if let Some(signal) = self.connections_read.get_mut(&name) {
                signal.capture(payload);
            }
        }
        let label = self.label();
        let mut io = ControllerIo {
            label: &label,
            state: &mut self.state,
            reads: &self.connections_read,
            writes: &mut self.connections_write,
        };
        self.model.update(dt, &mut io).map_err(|e| e.within(&label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::state_map;

    #[derive(Debug)]
    struct Watch;

    impl ControllerModel for Watch {
        fn type_name(&self) -> &'static str {
            "Watch"
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::empty())
        }

        fn required_read(&self) -> &'static [&'static str] {
            &["level", "valve"]
        }

        fn required_write(&self) -> &'static [&'static str] {
            &["valve"]
        }

        fn update(&mut self, _dt: f64, io: &mut ControllerIo<'_>) -> KernelResult<()> {
            let level = io.read_f64("level", "a")?;
            io.write("valve", state_map([("g", level)]))
        }
    }

    #[derive(Debug)]
    struct Twice;

    impl ControllerModel for Twice {
        fn type_name(&self) -> &'static str {
            "Twice"
        }

        fn schema(&self) -> Arc<Schema> {
            Arc::new(Schema::empty())
        }

        fn required_read(&self) -> &'static [&'static str] {
            &["a", "a"]
        }
    }

    fn node(id: u64) -> Endpoint {
        Endpoint::new(ComponentId::new(id), ComponentKind::Node)
    }

    fn watch() -> Controller {
        Controller::new(ComponentId::new(9), None, Box::new(Watch), StateMap::new()).unwrap()
    }

    #[test]
    fn duplicate_contract_names_rejected() {
        let err = Controller::new(ComponentId::new(1), None, Box::new(Twice), StateMap::new())
            .unwrap_err();
        assert!(matches!(err, KernelError::Configuration { .. }));
    }

    #[test]
    fn attach_creates_one_signal_per_role() {
        let mut ctrl = watch();
        let refs = ctrl.attach("valve", Endpoint::new(ComponentId::new(2), ComponentKind::Edge)).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(ctrl.contract_role("valve"), Some(ConnectionRole::Both));
        assert_eq!(ctrl.connections()["valve"], (ConnectionRole::Both, ComponentId::new(2)));
        assert_eq!(ctrl.missing_connections(), ["level"]);

        let refs = ctrl.attach("level", node(1)).unwrap();
        assert_eq!(refs[0].role, SignalRole::Read);
        assert!(ctrl.missing_connections().is_empty());
    }

    #[test]
    fn attach_rejects_unknown_repeated_and_controller_peers() {
        let mut ctrl = watch();
        assert!(ctrl.attach("pump", node(1)).is_err());
        ctrl.attach("level", node(1)).unwrap();
        assert!(ctrl.attach("level", node(1)).is_err());
        let other = Endpoint::new(ComponentId::new(3), ComponentKind::Controller);
        assert!(ctrl.attach("valve", other).is_err());
        assert!(!ctrl.connections_write().contains_key("valve"));
    }

    #[test]
    fn update_reads_captures_and_stages_writes() {
        let mut ctrl = watch();
        ctrl.attach("level", node(1)).unwrap();
        ctrl.attach("valve", Endpoint::new(ComponentId::new(2), ComponentKind::Edge)).unwrap();

        let captures = BTreeMap::from([("level".to_string(), state_map([("a", 7.0)]))]);
        ctrl.update(0.1, captures).unwrap();
        assert_eq!(ctrl.connections_write()["valve"].read()["g"], StateValue::Float(7.0));
        assert_eq!(ctrl.snapshot()["level"]["a"], StateValue::Float(7.0));
    }

    #[test]
    fn missing_capture_field_is_unknown() {
        let mut ctrl = watch();
        ctrl.attach("level", node(1)).unwrap();
        ctrl.attach("valve", Endpoint::new(ComponentId::new(2), ComponentKind::Edge)).unwrap();
        let err = ctrl.update(0.1, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, KernelError::UnknownField { .. }));
    }
}
