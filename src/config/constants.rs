// Project-wide constants
//
// Centralised here so limits and other magic values have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Maximum model/tool cycles in one turn before it fails with
/// `CycleLimitExceeded`.
pub const MAX_CYCLES: usize = 8;

/// Row cap injected by the SQL guard when a query has no `LIMIT` clause.
pub const DEFAULT_ROW_LIMIT: u64 = 100;

/// Absolute row cap. Explicit limits above this are rewritten down.
pub const MAX_ROW_LIMIT: u64 = 1000;

/// Words per `chunk` event when streaming the final answer.
pub const DEFAULT_CHUNK_WORDS: usize = 20;

/// Default HTTP port (matches the conventional development port).
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default bind address for the HTTP server (localhost only).
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8000";

/// Default model when neither the config file nor `OPENAI_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Default OpenAI-compatible API base (includes the version segment).
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default sampling temperature for tool-calling turns.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default maximum tokens per model reply.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Request body limit for the HTTP transport (4MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// `read_file` returns at most this many bytes of content.
pub const MAX_READ_BYTES: usize = 100_000;

/// `list_files` returns at most this many paths.
pub const MAX_LIST_FILES: usize = 1000;

/// `search_files` hit cap bounds.
pub const DEFAULT_SEARCH_HITS: u64 = 20;
pub const MAX_SEARCH_HITS: u64 = 100;

/// Characters of file content returned per search hit.
pub const SEARCH_SNIPPET_CHARS: usize = 400;

/// Maximum directory depth walked by the file tools.
pub const MAX_WALK_DEPTH: usize = 16;
