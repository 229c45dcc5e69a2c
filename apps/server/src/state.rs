use std::sync::Arc;

use analysis_clients::{
    HttpAudioTranscoder, HttpFluencyAnalyzer, HttpPronunciationAnalyzer, HttpSpeechToText,
    HttpTextAnalyzer, VocabularyService,
};
use coordination::AnalysisCoordinator;
use eventbus::{EventBusClient, EventPublisher, Topic, TopicMap};
use file_sessions::FileSessionManager;
use orchestration::AnalysisOrchestrator;
use persistence::PostgresSubmissionRepository;
use results_store::ResultsStore;
use sqlx::postgres::PgPoolOptions;
use submission::SubmissionAggregator;

/// All shared, process-wide component state, assembled once in
/// [`AppState::build`] and cloned cheaply (everything inside is an
/// `Arc`) into every axum handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn EventPublisher>,
    pub results_store: Arc<ResultsStore>,
    pub file_sessions: Arc<FileSessionManager>,
    pub coordinator: Arc<AnalysisCoordinator>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub aggregator: Arc<SubmissionAggregator>,
    pub audio_transcoder: Arc<HttpAudioTranscoder>,
    pub speech_to_text: Arc<HttpSpeechToText>,
}

impl AppState {
    pub async fn build(env: &env::Env) -> Self {
        VocabularyService::init();

        let http = reqwest::Client::new();

        let topics = TopicMap::default()
            .insert(
                Topic::QuestionAnalysisReady,
                format!("{}/webhooks/question-analysis-ready", env.event_bus_base_url),
            )
            .insert(
                Topic::PronunciationDone,
                format!("{}/webhooks/pronunciation-done", env.event_bus_base_url),
            )
            .insert(
                Topic::GrammarDone,
                format!("{}/webhooks/grammar-done", env.event_bus_base_url),
            )
            .insert(
                Topic::LexicalDone,
                format!("{}/webhooks/lexical-done", env.event_bus_base_url),
            )
            .insert(
                Topic::VocabularyDone,
                format!("{}/webhooks/vocabulary-done", env.event_bus_base_url),
            )
            .insert(
                Topic::FluencyDone,
                format!("{}/webhooks/fluency-done", env.event_bus_base_url),
            )
            .insert(
                Topic::AnalysisComplete,
                format!("{}/webhooks/analysis-complete", env.event_bus_base_url),
            )
            .insert(
                Topic::SubmissionAnalysisComplete,
                format!(
                    "{}/webhooks/submission-analysis-complete",
                    env.event_bus_base_url
                ),
            )
            .insert(
                Topic::StudentSubmission,
                format!("{}/webhooks/student-submission", env.event_bus_base_url),
            )
            .insert(
                Topic::AudioConversionDone,
                format!("{}/webhooks/audio-conversion-done", env.event_bus_base_url),
            )
            .insert(
                Topic::TranscriptionDone,
                format!("{}/webhooks/transcription-done", env.event_bus_base_url),
            );

        let publisher: Arc<dyn EventPublisher> = Arc::new(EventBusClient::init(topics));

        let results_store = Arc::new(ResultsStore::new());
        let file_sessions = Arc::new(FileSessionManager::new());
        let coordinator = Arc::new(AnalysisCoordinator::new(publisher.clone()));

        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            publisher.clone(),
            results_store.clone(),
            file_sessions.clone(),
            Arc::new(HttpPronunciationAnalyzer::new(
                http.clone(),
                env.pronunciation_base_url.clone(),
            )),
            Arc::new(HttpTextAnalyzer::grammar(
                http.clone(),
                env.text_analysis_base_url.clone(),
            )),
            Arc::new(HttpTextAnalyzer::lexical(
                http.clone(),
                env.text_analysis_base_url.clone(),
            )),
            Arc::new(HttpTextAnalyzer::vocabulary(
                http.clone(),
                env.text_analysis_base_url.clone(),
            )),
            Arc::new(HttpFluencyAnalyzer::new(
                http.clone(),
                env.fluency_base_url.clone(),
            )),
        ));

        let pg_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&env.database_url)
            .await
            .expect("failed to connect to submission results database");
        let repository = Arc::new(PostgresSubmissionRepository::new(pg_pool));
        let aggregator = Arc::new(SubmissionAggregator::new(
            results_store.clone(),
            repository,
            publisher.clone(),
        ));

        let audio_transcoder = Arc::new(HttpAudioTranscoder::new(
            http.clone(),
            env.audio_transcoder_base_url.clone(),
        ));
        let speech_to_text = Arc::new(HttpSpeechToText::new(
            http.clone(),
            env.speech_to_text_base_url.clone(),
        ));

        Self {
            publisher,
            results_store,
            file_sessions,
            coordinator,
            orchestrator,
            aggregator,
            audio_transcoder,
            speech_to_text,
        }
    }
}
