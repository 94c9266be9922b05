//! Process entry point for the estatebot voice bridge.
//!
//! Loads configuration, opens the conversation database and assembles one
//! voice session: recognizer, synthesizer, conversational engine and history
//! store around a media transport, run under the startup retry supervisor.

pub mod config;

use estatebot_db::DbPool;
use estatebot_voice::{
    BridgeConfig, DeepgramStt, DeepgramTts, HttpConversationEngine, MediaTransport,
    ResponseOrchestrator, Session, SessionController, SessionReport, SqliteHistoryStore,
    StartupSupervisor, VoiceError,
};
use std::sync::Arc;

/// A fully wired session controller and its startup policy.
pub struct Bridge {
    controller: SessionController,
    supervisor: StartupSupervisor,
    config_id: String,
}

impl Bridge {
    /// Wires the production adapters around `transport`.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError` if the configuration is incomplete or an HTTP
    /// client cannot be built.
    pub fn new(
        config: &BridgeConfig,
        transport: Arc<dyn MediaTransport>,
        pool: DbPool,
    ) -> Result<Self, VoiceError> {
        config.validate()?;

        let history = Arc::new(SqliteHistoryStore::new(pool));
        let engine = Arc::new(HttpConversationEngine::new(&config.engine)?);
        let orchestrator = Arc::new(ResponseOrchestrator::new(
            history.clone(),
            engine,
            config.engine.project.clone(),
            &config.session,
        ));
        let stt = Arc::new(DeepgramStt::new(
            config.deepgram.clone(),
            config.session.frame_channel_capacity,
            config.session.transcript_channel_capacity,
        ));
        let tts = Arc::new(DeepgramTts::new(config.deepgram.clone())?);

        let controller = SessionController::new(
            transport,
            stt,
            tts,
            orchestrator,
            history,
            config.session.clone(),
            config.deepgram.sample_rate,
        );

        Ok(Self {
            controller,
            supervisor: StartupSupervisor::new(config.retry),
            config_id: config.engine.project.clone(),
        })
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Runs `session` to completion, retrying the join while the remote
    /// participant has not arrived.
    pub async fn run(&self, session: &Session) -> Result<SessionReport, VoiceError> {
        tracing::info!(
            room = %session.room,
            participant = %session.participant_identity,
            user_id = %session.user_id,
            session_id = %session.session_id,
            project = %self.config_id,
            "starting voice session"
        );
        self.supervisor
            .run(|attempt| {
                tracing::debug!(attempt, "joining room");
                self.controller.start(session)
            })
            .await
    }
}
