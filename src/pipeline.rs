//! Answer pipeline orchestration.
//!
//! One request flows: validate → retrieve supporting chunks → assemble the
//! context block → generate the long-form answer → generate the spoken
//! draft → sanitize → synthesize audio. Collaborators are injected behind
//! traits so the flow is testable without the hosted APIs, and constructed
//! exactly once at startup from validated configuration.

use std::sync::Arc;

use crate::config::Config;
use crate::context::assemble;
use crate::error::{PipelineError, Result};
use crate::generation::{Generator, OpenAiGenerator};
use crate::sanitize::Sanitizer;
use crate::search::search_chunks;
use crate::synthesis::{ElevenLabsSynthesizer, Synthesizer};

/// Full response bundle for one question.
#[derive(Debug)]
pub struct Answer {
    pub full_text: String,
    pub voice_text: String,
    pub audio: Vec<u8>,
}

pub struct AnswerPipeline {
    config: Arc<Config>,
    generator: Box<dyn Generator>,
    synthesizer: Box<dyn Synthesizer>,
    sanitizer: Sanitizer,
}

impl AnswerPipeline {
    /// Build the pipeline with the real hosted collaborators. Validates the
    /// collaborator credentials up front so a misconfigured deployment
    /// fails at startup, not on the first request.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let generator = Box::new(OpenAiGenerator::new(&config.generation)?);
        let synthesizer = Box::new(ElevenLabsSynthesizer::new(&config.synthesis)?);
        Self::with_collaborators(config, generator, synthesizer)
    }

    /// Build the pipeline around caller-supplied collaborators.
    pub fn with_collaborators(
        config: Arc<Config>,
        generator: Box<dyn Generator>,
        synthesizer: Box<dyn Synthesizer>,
    ) -> Result<Self> {
        let sanitizer = Sanitizer::new(&config.sanitize)?;
        Ok(Self {
            config,
            generator,
            synthesizer,
            sanitizer,
        })
    }

    /// Long-form answer: retrieval-grounded, polite register.
    pub async fn full_answer(&self, question: &str) -> Result<String> {
        let question = validate_question(question)?;

        let results = search_chunks(&self.config, &question, self.config.retrieval.limit).await?;
        let context = assemble(&results);

        let input = compose_full_input(&question, &context);
        let text = self
            .generator
            .generate(
                &self.config.generation.full_instructions,
                &input,
                self.config.generation.full_max_tokens,
                None,
            )
            .await?;

        Ok(text.trim().to_string())
    }

    /// Long-form answer plus the sanitized spoken script derived from it.
    pub async fn voice_script(&self, question: &str) -> Result<(String, String)> {
        let question = validate_question(question)?;
        let full_text = self.full_answer(&question).await?;

        let input = compose_voice_input(&question, &full_text);
        let draft = self
            .generator
            .generate(
                &self.config.generation.voice_instructions,
                &input,
                self.config.generation.voice_max_tokens,
                Some(self.config.generation.voice_temperature),
            )
            .await?;

        let voice_text = self.sanitizer.sanitize(draft.trim(), &question);
        Ok((full_text, voice_text))
    }

    /// The whole thing: text answers and synthesized audio.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let (full_text, voice_text) = self.voice_script(question).await?;
        let audio = self.synthesizer.synthesize(&voice_text).await?;

        Ok(Answer {
            full_text,
            voice_text,
            audio,
        })
    }
}

fn validate_question(question: &str) -> Result<String> {
    let q = question.trim();
    if q.is_empty() {
        return Err(PipelineError::Validation("question is required".to_string()));
    }
    Ok(q.to_string())
}

/// Input for the long-form stage. The context section is omitted entirely
/// when retrieval found nothing.
fn compose_full_input(question: &str, context: &str) -> String {
    if context.is_empty() {
        format!("【ユーザーの質問】\n{}", question)
    } else {
        format!(
            "【ユーザーの質問】\n{}\n\n【参考情報（DB検索の抜粋）】\n{}",
            question, context
        )
    }
}

/// Input for the spoken-draft stage: the long answer is reference material,
/// not a script to read aloud.
fn compose_voice_input(question: &str, full_text: &str) -> String {
    format!(
        "【ユーザーの質問】\n{}\n\n【参考：長い回答（読み上げ禁止。内容の参考にするだけ）】\n{}",
        question, full_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig};
    use crate::{db, indexer, migrate};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubGenerator {
        responses: Mutex<Vec<String>>,
        inputs: Arc<Mutex<Vec<String>>>,
    }

    impl StubGenerator {
        /// Returns the stub plus a handle onto the inputs it will record.
        fn new(responses: &[&str]) -> (Self, Arc<Mutex<Vec<String>>>) {
            // popped back-to-front
            let mut responses: Vec<String> = responses.iter().map(|s| s.to_string()).collect();
            responses.reverse();
            let inputs = Arc::new(Mutex::new(Vec::new()));
            let stub = Self {
                responses: Mutex::new(responses),
                inputs: Arc::clone(&inputs),
            };
            (stub, inputs)
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(
            &self,
            _instructions: &str,
            input: &str,
            _max_output_tokens: u32,
            _temperature: Option<f32>,
        ) -> Result<String> {
            self.inputs.lock().unwrap().push(input.to_string());
            Ok(self.responses.lock().unwrap().pop().unwrap_or_default())
        }
    }

    struct StubSynthesizer;

    #[async_trait]
    impl Synthesizer for StubSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Arc<Config> {
        Arc::new(Config {
            db: DbConfig {
                path: dir.path().join("lexvox.sqlite"),
            },
            indexing: Default::default(),
            retrieval: Default::default(),
            generation: Default::default(),
            synthesis: Default::default(),
            sanitize: Default::default(),
            server: Default::default(),
        })
    }

    fn pipeline_with(config: Arc<Config>, generator: StubGenerator) -> AnswerPipeline {
        AnswerPipeline::with_collaborators(config, Box::new(generator), Box::new(StubSynthesizer))
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_question_fails_validation_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, inputs) = StubGenerator::new(&[]);
        let pipeline = pipeline_with(test_config(&dir), generator);

        let err = pipeline.answer("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_flows_through_retrieval_generation_and_sanitizer() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        migrate::run_migrations(&config).await.unwrap();

        let pool = db::connect(&config).await.unwrap();
        indexer::reindex(
            &pool,
            "sources/rouki.xml",
            "使用者は zangyou 残業 について割増賃金を支払わなければならない",
            &config.indexing,
        )
        .await
        .unwrap();
        pool.close().await;

        let (generator, _inputs) = StubGenerator::new(&[
            "一般的には、残業代の請求には時効があります。記録を確認してみてください。",
            "興味を持ってもらえてうれしいです。残業代には時効があります。",
        ]);
        let pipeline = pipeline_with(config, generator);

        let answer = pipeline.answer("残業代を請求されて困っています").await.unwrap();

        assert!(answer.full_text.contains("時効"));
        // the banned opener was rewritten by the sanitizer
        assert!(answer.voice_text.starts_with("そうですよね。"));
        assert!(!answer.voice_text.ends_with('？'));
        assert_eq!(answer.audio, answer.voice_text.as_bytes());
    }

    #[tokio::test]
    async fn test_retrieved_context_reaches_the_generator() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        migrate::run_migrations(&config).await.unwrap();

        let pool = db::connect(&config).await.unwrap();
        indexer::reindex(
            &pool,
            "sources/rouki.xml",
            "kaiko 解雇 の予告は三十日前にしなければならない",
            &config.indexing,
        )
        .await
        .unwrap();
        pool.close().await;

        let (generator, inputs) = StubGenerator::new(&["回答です。"]);
        let pipeline = pipeline_with(Arc::clone(&config), generator);
        // single exact token: the default FTS5 tokenizer keeps CJK runs whole,
        // so an ASCII marker is the reliable way to hit one chunk
        let _ = pipeline.full_answer("kaiko").await.unwrap();

        let inputs = inputs.lock().unwrap();
        assert!(inputs[0].contains("【ユーザーの質問】"));
        assert!(inputs[0].contains("【参考情報（DB検索の抜粋）】"));
        assert!(inputs[0].contains("【根拠1】source_id=sources/rouki.xml"));
    }

    #[tokio::test]
    async fn test_no_retrieval_hit_omits_context_section() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        migrate::run_migrations(&config).await.unwrap();

        let (generator, inputs) = StubGenerator::new(&["回答です。"]);
        let pipeline = pipeline_with(Arc::clone(&config), generator);
        let _ = pipeline
            .full_answer("どこにも出てこない質問です")
            .await
            .unwrap();

        let inputs = inputs.lock().unwrap();
        assert!(inputs[0].contains("【ユーザーの質問】"));
        assert!(!inputs[0].contains("【参考情報"));
    }

    #[test]
    fn test_compose_full_input_with_and_without_context() {
        let with = compose_full_input("質問", "【根拠1】source_id=a\nexcerpt=x");
        assert!(with.contains("【参考情報（DB検索の抜粋）】"));

        let without = compose_full_input("質問", "");
        assert_eq!(without, "【ユーザーの質問】\n質問");
    }

    #[test]
    fn test_compose_voice_input_forbids_reading_aloud() {
        let input = compose_voice_input("質問", "長い回答");
        assert!(input.contains("読み上げ禁止"));
        assert!(input.ends_with("長い回答"));
    }
}
