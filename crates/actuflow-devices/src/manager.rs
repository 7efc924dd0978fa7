/*!
 * Actor manager for actuflow.
 *
 * The manager owns the registered actors, starts them, keeps the ones that
 * failed to start out of dispatch, and serializes every call into a given
 * actor.
 */
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use actuflow_core::config::{Config, DacOutputSettings};
use actuflow_core::storage::SharedStorage;

use crate::actor::{ActionResponse, Actor, ActorDescription, ActorError, Result};
use crate::devices::GenericDacOutput;
use crate::hardware::AnalogOutput;

/// What happened to a managed actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEventKind {
    /// The actor was added to the manager
    Registered,
    /// The actor started and is available for dispatch
    Started,
    /// The actor failed to start and is unavailable
    StartFailed(String),
    /// The actor accepted a new settings document
    Configured,
    /// A command was dispatched to the actor
    ActionDispatched(i32),
}

/// Event published by the manager
#[derive(Debug, Clone)]
pub struct ManagerEvent {
    /// Registration name of the actor
    pub actor: String,
    /// What happened
    pub kind: ManagerEventKind,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Outcome of [`ActorManager::start_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartSummary {
    /// Actors now available
    pub started: Vec<String>,
    /// Actors that failed to start
    pub unavailable: Vec<String>,
}

/// Where a managed actor stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    /// Registered, `begin` not attempted yet
    Registered,
    /// Started and accepting commands
    Available,
    /// `begin` failed; excluded from dispatch
    Unavailable,
}

type SharedActor = Arc<Mutex<Box<dyn Actor>>>;

#[derive(Debug)]
struct ManagedActor {
    actor: SharedActor,
    status: ActorStatus,
}

/// Owner of a set of actors
#[derive(Debug)]
pub struct ActorManager {
    actors: RwLock<BTreeMap<String, ManagedActor>>,
    event_sender: broadcast::Sender<ManagerEvent>,
}

impl ActorManager {
    /// Create an empty manager
    pub fn new() -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            actors: RwLock::new(BTreeMap::new()),
            event_sender,
        }
    }

    /// Create a manager holding one [`GenericDacOutput`] per `[[devices]]` entry
    ///
    /// `hardware` is called once per entry to obtain its binding. The
    /// outputs are registered but not started.
    pub async fn from_config<H, F>(
        config: &Config,
        storage: SharedStorage,
        mut hardware: F,
    ) -> Result<Self>
    where
        H: AnalogOutput + 'static,
        F: FnMut(&DacOutputSettings) -> H,
    {
        let manager = Self::new();
        for settings in &config.devices {
            let output =
                GenericDacOutput::from_settings(settings, storage.clone(), hardware(settings));
            manager.register(Box::new(output)).await?;
        }
        Ok(manager)
    }

    fn publish(&self, actor: &str, kind: ManagerEventKind) {
        let _ = self.event_sender.send(ManagerEvent {
            actor: actor.to_string(),
            kind,
            at: Utc::now(),
        });
    }

    /// Register an actor under its current name
    pub async fn register(&self, actor: Box<dyn Actor>) -> Result<()> {
        let name = actor.name().to_string();
        let mut actors = self.actors.write().await;
        if actors.contains_key(&name) {
            return Err(ActorError::AlreadyRegistered(name));
        }

        actors.insert(
            name.clone(),
            ManagedActor {
                actor: Arc::new(Mutex::new(actor)),
                status: ActorStatus::Registered,
            },
        );
        drop(actors);

        debug!("Registered actor {}", name);
        self.publish(&name, ManagerEventKind::Registered);
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<(SharedActor, ActorStatus)> {
        let actors = self.actors.read().await;
        actors
            .get(name)
            .map(|managed| (managed.actor.clone(), managed.status))
            .ok_or_else(|| ActorError::NotFound(name.to_string()))
    }

    async fn set_status(&self, name: &str, status: ActorStatus) {
        if let Some(managed) = self.actors.write().await.get_mut(name) {
            managed.status = status;
        }
    }

    /// Start one actor, updating its availability
    pub async fn start(&self, name: &str) -> Result<()> {
        let (actor, _) = self.lookup(name).await?;
        let result = actor.lock().await.begin();
        let status = if result.is_ok() {
            ActorStatus::Available
        } else {
            ActorStatus::Unavailable
        };
        self.set_status(name, status).await;

        match &result {
            Ok(()) => self.publish(name, ManagerEventKind::Started),
            Err(e) => {
                warn!("Actor {} is unavailable: {}", name, e);
                self.publish(name, ManagerEventKind::StartFailed(e.to_string()));
            }
        }
        result
    }

    /// Start every registered actor
    ///
    /// A failing actor is marked unavailable and does not stop the others.
    pub async fn start_all(&self) -> StartSummary {
        let names = self.names().await;
        let mut summary = StartSummary::default();

        for name in names {
            match self.start(&name).await {
                Ok(()) => summary.started.push(name),
                Err(_) => summary.unavailable.push(name),
            }
        }

        info!(
            "Started {} actors, {} unavailable",
            summary.started.len(),
            summary.unavailable.len()
        );
        summary
    }

    /// Where the actor stands
    pub async fn status(&self, name: &str) -> Result<ActorStatus> {
        Ok(self.lookup(name).await?.1)
    }

    /// Whether the actor started and accepts commands
    pub async fn is_available(&self, name: &str) -> Result<bool> {
        Ok(self.status(name).await? == ActorStatus::Available)
    }

    /// Dispatch a command to an available actor
    pub async fn dispatch(&self, name: &str, action: i32, payload: &str) -> Result<ActionResponse> {
        let (actor, status) = self.lookup(name).await?;
        match status {
            ActorStatus::Available => {}
            ActorStatus::Registered => return Err(ActorError::NotStarted(name.to_string())),
            ActorStatus::Unavailable => return Err(ActorError::Unavailable(name.to_string())),
        }

        let response = actor.lock().await.receive_action(action, payload)?;
        self.publish(name, ManagerEventKind::ActionDispatched(action));
        Ok(response)
    }

    /// Current settings document of an actor
    pub async fn get_config(&self, name: &str) -> Result<String> {
        let (actor, _) = self.lookup(name).await?;
        let config = actor.lock().await.get_config();
        Ok(config)
    }

    /// Apply a settings document to an actor
    ///
    /// Availability is left unchanged; an unavailable actor must be started again.
    pub async fn set_config(&self, name: &str, config: &str, save: bool) -> Result<()> {
        let (actor, _) = self.lookup(name).await?;
        actor.lock().await.set_config(config, save)?;
        self.publish(name, ManagerEventKind::Configured);
        Ok(())
    }

    /// Descriptions of every available actor, paired with its registration name
    ///
    /// The description name can differ from the registration name once
    /// persisted settings rename the actor; dispatch uses the latter.
    pub async fn describe_all(&self) -> Vec<(String, ActorDescription)> {
        let available: Vec<(String, SharedActor)> = {
            let actors = self.actors.read().await;
            actors
                .iter()
                .filter(|(_, managed)| managed.status == ActorStatus::Available)
                .map(|(name, managed)| (name.clone(), managed.actor.clone()))
                .collect()
        };

        let mut descriptions = Vec::with_capacity(available.len());
        for (name, actor) in available {
            let description = actor.lock().await.description().clone();
            descriptions.push((name, description));
        }
        descriptions
    }

    /// Registration names, sorted
    pub async fn names(&self) -> Vec<String> {
        self.actors.read().await.keys().cloned().collect()
    }

    /// Number of registered actors
    pub async fn count(&self) -> usize {
        self.actors.read().await.len()
    }

    /// Subscribe to manager events
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.event_sender.subscribe()
    }
}

impl Default for ActorManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use actuflow_core::storage::MemoryStorage;

    use crate::hardware::SimulatedDac;

    fn dac(
        name: &str,
        pin: i32,
        file: &str,
        storage: &SharedStorage,
        hw: SimulatedDac,
    ) -> Box<dyn Actor> {
        Box::new(GenericDacOutput::with_config_file(name, pin, file, storage.clone(), hw))
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let manager = ActorManager::new();
        manager
            .register(dac("a", 25, "A.json", &storage, SimulatedDac::new()))
            .await
            .unwrap();
        let err = manager
            .register(dac("a", 26, "B.json", &storage, SimulatedDac::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ActorError::AlreadyRegistered(name) if name == "a"));
        assert_eq!(manager.count().await, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_start_all_marks_failures_unavailable() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        storage.write("/settings/act/Broken.json", "not json").unwrap();

        let manager = ActorManager::new();
        manager
            .register(dac("good", 25, "Good.json", &storage, SimulatedDac::new()))
            .await
            .unwrap();
        manager
            .register(dac("broken", 26, "Broken.json", &storage, SimulatedDac::new()))
            .await
            .unwrap();

        let summary = manager.start_all().await;
        assert_eq!(summary.started, vec!["good".to_string()]);
        assert_eq!(summary.unavailable, vec!["broken".to_string()]);
        assert!(manager.is_available("good").await.unwrap());
        assert_eq!(manager.status("broken").await.unwrap(), ActorStatus::Unavailable);

        let err = manager.dispatch("broken", 0, "10").await.unwrap_err();
        assert!(matches!(err, ActorError::Unavailable(_)));

        let descriptions = manager.describe_all().await;
        assert_eq!(descriptions.len(), 1);
        assert_eq!(descriptions[0].0, "good");
        assert_eq!(descriptions[0].1.name, "good");
    }

    #[tokio::test]
    async fn test_dispatch_reaches_hardware() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let hw = SimulatedDac::new();
        let manager = ActorManager::new();
        manager
            .register(dac("dac", 25, "AnalogDAC.json", &storage, hw.clone()))
            .await
            .unwrap();

        assert_eq!(manager.status("dac").await.unwrap(), ActorStatus::Registered);
        assert!(matches!(
            manager.dispatch("dac", 0, "1").await,
            Err(ActorError::NotStarted(_))
        ));

        manager.start("dac").await.unwrap();
        let response = manager.dispatch("dac", 0, "300").await.unwrap();
        assert_eq!(response, ActionResponse::ack());
        assert_eq!(hw.last_write(), Some((25, 255)));

        assert!(matches!(
            manager.dispatch("dac", 7, "ignored").await,
            Err(ActorError::UnsupportedCommand(7))
        ));
        assert!(matches!(
            manager.dispatch("missing", 0, "1").await,
            Err(ActorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_configure_through_manager() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let hw = SimulatedDac::new();
        let manager = ActorManager::new();
        manager
            .register(dac("dac", 25, "AnalogDAC.json", &storage, hw.clone()))
            .await
            .unwrap();
        manager.start("dac").await.unwrap();

        manager
            .set_config("dac", r#"{"Name":"dac","Pin":26}"#, true)
            .await
            .unwrap();
        assert_eq!(manager.get_config("dac").await.unwrap(), r#"{"Name":"dac","Pin":26}"#);
        assert_eq!(
            storage.read("/settings/act/AnalogDAC.json").unwrap(),
            r#"{"Name":"dac","Pin":26}"#
        );

        assert!(manager.set_config("dac", "not json", true).await.is_err());
        assert!(manager.is_available("dac").await.unwrap());

        manager.dispatch("dac", 0, "5").await.unwrap();
        assert_eq!(hw.last_write(), Some((26, 5)));
    }

    #[tokio::test]
    async fn test_events() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let manager = ActorManager::new();
        let mut events = manager.subscribe();

        manager
            .register(dac("dac", 25, "AnalogDAC.json", &storage, SimulatedDac::new()))
            .await
            .unwrap();
        manager.start("dac").await.unwrap();
        manager.dispatch("dac", 0, "1").await.unwrap();

        let kinds: Vec<ManagerEventKind> = (0..3)
            .map(|_| events.try_recv().unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ManagerEventKind::Registered,
                ManagerEventKind::Started,
                ManagerEventKind::ActionDispatched(0),
            ]
        );
    }

    #[tokio::test]
    async fn test_persisted_rename_keeps_registration_name() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        storage
            .write("/settings/act/AnalogDAC.json", r#"{"Name":"renamed","Pin":26}"#)
            .unwrap();
        let manager = ActorManager::new();
        manager
            .register(dac("dac", 25, "AnalogDAC.json", &storage, SimulatedDac::new()))
            .await
            .unwrap();
        manager.start("dac").await.unwrap();

        let descriptions = manager.describe_all().await;
        assert_eq!(descriptions[0].0, "dac");
        assert_eq!(descriptions[0].1.name, "renamed");
        assert!(manager.dispatch("dac", 0, "1").await.is_ok());
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = Config::default();
        config.devices.push(DacOutputSettings {
            name: "fan".to_string(),
            pin: 25,
            config_file: "Fan.json".to_string(),
        });
        config.devices.push(DacOutputSettings {
            name: "heater".to_string(),
            pin: 4,
            config_file: "Heater.json".to_string(),
        });

        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let manager = ActorManager::from_config(&config, storage.clone(), |_| SimulatedDac::esp32())
            .await
            .unwrap();
        assert_eq!(manager.names().await, vec!["fan".to_string(), "heater".to_string()]);

        let summary = manager.start_all().await;
        assert_eq!(summary.started, vec!["fan".to_string()]);
        assert_eq!(summary.unavailable, vec!["heater".to_string()]);
        assert!(storage.exists("/settings/act/Fan.json").unwrap());
        assert!(!storage.exists("/settings/act/Heater.json").unwrap());
    }
}
