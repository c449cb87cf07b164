use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Window size in characters (the corpus is Japanese statute text,
    /// so all length accounting is in chars, not bytes).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive windows of the same source.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> i64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Token budget for the long-form answer.
    #[serde(default = "default_full_max_tokens")]
    pub full_max_tokens: u32,
    /// Token budget for the spoken-style draft.
    #[serde(default = "default_voice_max_tokens")]
    pub voice_max_tokens: u32,
    /// Sampling temperature for the spoken draft (the long-form answer uses
    /// the API default).
    #[serde(default = "default_voice_temperature")]
    pub voice_temperature: f32,
    #[serde(default = "default_gen_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gen_max_retries")]
    pub max_retries: u32,
    /// Persona instructions for the long-form answer. The fixed persona is
    /// deployment policy, not pipeline logic, so it lives here and can be
    /// replaced wholesale in the TOML file.
    #[serde(default = "default_full_instructions")]
    pub full_instructions: String,
    /// Persona instructions for the spoken-style draft.
    #[serde(default = "default_voice_instructions")]
    pub voice_instructions: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            full_max_tokens: default_full_max_tokens(),
            voice_max_tokens: default_voice_max_tokens(),
            voice_temperature: default_voice_temperature(),
            timeout_secs: default_gen_timeout_secs(),
            max_retries: default_gen_max_retries(),
            full_instructions: default_full_instructions(),
            voice_instructions: default_voice_instructions(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_full_max_tokens() -> u32 {
    650
}
fn default_voice_max_tokens() -> u32 {
    220
}
fn default_voice_temperature() -> f32 {
    0.75
}
fn default_gen_timeout_secs() -> u64 {
    60
}
fn default_gen_max_retries() -> u32 {
    3
}

fn default_full_instructions() -> String {
    "あなたは弁護士監修のリーガルサポートAIです。\n\
     ただし弁護士本人ではなくAIであるため、断定的な法的判断、個別案件の最終判断、非弁行為はしません。\n\
     \n\
     必ず以下の形式で、ですます調で回答してください。\n\
     \n\
     ① 共感\n\
     ② 一般的説明\n\
     ③ 状況で変わる点\n\
     ④ 必要時のみ弁護士相談誘導\n\
     \n\
     追加ルール：\n\
     - 不安を煽らず、心理的安心も提供する\n\
     - 断定は避ける（一般的には／可能性があります／状況によります）"
        .to_string()
}

fn default_voice_instructions() -> String {
    "あなたは弁護士監修のリーガルサポートAIです（AIであり弁護士本人ではない）。\n\
     これは「音声メッセージ原稿」です。耳で聞いて自然な会話にしてください。\n\
     \n\
     【長さ】\n\
     - 18〜30秒（日本語120〜190文字が目安）\n\
     - 200文字は絶対に超えない\n\
     \n\
     【話し方】\n\
     - “説明文”ではなく“会話”。短い文でテンポよく（句点「。」を多めに）\n\
     - かたい法律文書口調は禁止（〜に該当します／〜と解されます 等）\n\
     - 余計なお礼・称賛から入らない（冒頭は共感1文だけ）\n\
     - 箇条書き、番号、見出しは禁止\n\
     \n\
     【構成（順番固定）】\n\
     1) 共感（1文）\n\
     2) 一般論（1〜2文、断定しない）\n\
     3) 変わるポイント（1文）\n\
     4) 次の一手（1文）\n\
     5) 締め（ふつうは安心の一言で終える。質問で終えない）\n\
     \n\
     【例外：入力があいまい/雑談（短い・抽象的）なときだけ】\n\
     - 最後に「確認の質問を1つだけ」して終える\n\
     - 質問で終える場合、5)の安心文は付けない"
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// ElevenLabs voice id. Required when synthesis is exercised
    /// (`serve`, `ask --audio`); search/index commands run without it.
    #[serde(default)]
    pub voice_id: String,
    #[serde(default = "default_tts_model")]
    pub model_id: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default = "default_style")]
    pub style: f32,
    #[serde(default = "default_speaker_boost")]
    pub use_speaker_boost: bool,
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice_id: String::new(),
            model_id: default_tts_model(),
            output_format: default_output_format(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            style: default_style(),
            use_speaker_boost: default_speaker_boost(),
            timeout_secs: default_tts_timeout_secs(),
        }
    }
}

fn default_tts_model() -> String {
    "eleven_v3".to_string()
}
fn default_output_format() -> String {
    "mp3_44100_192".to_string()
}
fn default_stability() -> f32 {
    0.5
}
fn default_similarity_boost() -> f32 {
    0.78
}
fn default_style() -> f32 {
    0.28
}
fn default_speaker_boost() -> bool {
    true
}
fn default_tts_timeout_secs() -> u64 {
    60
}

/// One substitution rule: a regex pattern and its literal replacement.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplaceRule {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SanitizeConfig {
    /// Absolute character ceiling for the spoken text.
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,
    /// Shortening target when a clarifying question must still fit.
    #[serde(default = "default_vague_cap")]
    pub vague_cap: usize,
    /// Banned-phrase substitutions, applied in order. Tone policy, not
    /// algorithm: edit the table, not the code.
    #[serde(default = "default_replacements")]
    pub replacements: Vec<ReplaceRule>,
    /// Connective smoothing: clause-joining patterns replaced with a full
    /// stop to split one long sentence into two.
    #[serde(default = "default_connectives")]
    pub connectives: Vec<ReplaceRule>,
    /// Appended when a vague question's answer does not already end with a
    /// question mark. Must itself end with `？`.
    #[serde(default = "default_clarifying_question")]
    pub clarifying_question: String,
    /// Reassurance closer that must not survive at the end of a
    /// question-terminated answer.
    #[serde(default = "default_reassurance_closer")]
    pub reassurance_closer: String,
    /// Questions at or below this many chars (after trim) are vague.
    #[serde(default = "default_max_trivial_chars")]
    pub max_trivial_chars: usize,
    /// The generic "law" token that marks a question as unspecific...
    #[serde(default = "default_generic_token")]
    pub generic_token: String,
    /// ...unless one of these concrete topic keywords is also present.
    #[serde(default = "default_topic_keywords")]
    pub topic_keywords: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            hard_cap: default_hard_cap(),
            vague_cap: default_vague_cap(),
            replacements: default_replacements(),
            connectives: default_connectives(),
            clarifying_question: default_clarifying_question(),
            reassurance_closer: default_reassurance_closer(),
            max_trivial_chars: default_max_trivial_chars(),
            generic_token: default_generic_token(),
            topic_keywords: default_topic_keywords(),
        }
    }
}

fn default_hard_cap() -> usize {
    200
}
fn default_vague_cap() -> usize {
    170
}

fn default_replacements() -> Vec<ReplaceRule> {
    let rules = [
        ("興味を持ってもらえてうれしいです。?", "そうですよね。"),
        ("お話しされたいとのこと、?", ""),
        (
            "安心して相談してください。?",
            "大丈夫。落ち着いて整理していきましょう。",
        ),
        ("について説明します。?", "を一緒に整理しましょう。"),
        ("結論として、?", ""),
        ("法的には、?", "一般的には、"),
    ];
    rules
        .iter()
        .map(|(p, r)| ReplaceRule {
            pattern: p.to_string(),
            replacement: r.to_string(),
        })
        .collect()
}

fn default_connectives() -> Vec<ReplaceRule> {
    let rules = [("ですが、", "です。"), ("ので、", "です。")];
    rules
        .iter()
        .map(|(p, r)| ReplaceRule {
            pattern: p.to_string(),
            replacement: r.to_string(),
        })
        .collect()
}

fn default_clarifying_question() -> String {
    "仕事・契約・家族など、どの場面の話が気になりますか？".to_string()
}

fn default_reassurance_closer() -> String {
    "大丈夫。落ち着いて整理していきましょう。".to_string()
}

fn default_max_trivial_chars() -> usize {
    10
}

fn default_generic_token() -> String {
    "法律".to_string()
}

fn default_topic_keywords() -> Vec<String> {
    [
        "契約",
        "解雇",
        "残業",
        "相続",
        "離婚",
        "慰謝料",
        "損害",
        "債務",
        "返済",
        "クレーム",
        "訴訟",
        "内容証明",
        "請求",
        "未払い",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory where synthesized mp3 files for webhook replies are written.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Public base URL under which `/media/{file}` is reachable. Required
    /// for webhook audio replies.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Duration hint (ms) sent with webhook audio messages.
    #[serde(default = "default_audio_duration_ms")]
    pub audio_duration_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            media_dir: default_media_dir(),
            public_base_url: None,
            audio_duration_ms: default_audio_duration_ms(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_media_dir() -> PathBuf {
    PathBuf::from("./media")
}
fn default_audio_duration_ms() -> u64 {
    20_000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.indexing.chunk_size == 0 {
        anyhow::bail!("indexing.chunk_size must be > 0");
    }
    if config.indexing.chunk_overlap >= config.indexing.chunk_size {
        anyhow::bail!("indexing.chunk_overlap must be smaller than indexing.chunk_size");
    }
    if config.retrieval.limit < 1 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }
    if config.sanitize.hard_cap == 0 {
        anyhow::bail!("sanitize.hard_cap must be > 0");
    }
    if config.sanitize.vague_cap > config.sanitize.hard_cap {
        anyhow::bail!("sanitize.vague_cap must not exceed sanitize.hard_cap");
    }
    if !config
        .sanitize
        .clarifying_question
        .ends_with(['？', '?'])
    {
        anyhow::bail!("sanitize.clarifying_question must end with a question mark");
    }
    Ok(())
}
