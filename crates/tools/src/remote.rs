//! Descriptors for tools the hosted service runs itself.
//!
//! These carry no handler. Their service configuration is forwarded verbatim
//! in the request's tool list.

use turnwise_core::tool::RemoteTool;

/// Hosted web search.
pub fn web_search() -> RemoteTool {
    RemoteTool::new(
        "web_search",
        "Search the web for current information.",
        serde_json::json!({ "type": "web_search_preview" }),
    )
}

/// Hosted retrieval over one or more document stores.
pub fn file_search(vector_store_ids: &[String], max_num_results: u32) -> RemoteTool {
    RemoteTool::new(
        "file_search",
        "Search uploaded documents for relevant passages.",
        serde_json::json!({
            "type": "file_search",
            "vector_store_ids": vector_store_ids,
            "max_num_results": max_num_results,
        }),
    )
}

/// Hosted sandboxed code execution.
pub fn code_interpreter() -> RemoteTool {
    RemoteTool::new(
        "code_interpreter",
        "Run Python code for calculations and analysis.",
        serde_json::json!({
            "type": "code_interpreter",
            "container": { "type": "auto" }
        }),
    )
}
