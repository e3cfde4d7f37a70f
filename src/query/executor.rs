//! Statement execution through a server-side evaluation shim.
//!
//! `box.execute` results cannot be sent back as they are: a failed statement
//! has to be reported in-band, and null or `cdata` cells do not survive the
//! trip. The shim below runs on the target, catches the failure, and replaces
//! such cells with text before anything is encoded.

use rmpv::Value;
use tracing::debug;

use crate::db::EngineClient;
use crate::error::Result;

/// Text that stands for a null cell.
pub const NULL_TOKEN: &str = "null";

/// Lua run on the target. The statement is its only argument.
pub const EVAL_SHIM: &str = r#"
local sql = ...
local res, err = box.execute(sql)
local array_mt = {__serialize = 'array'}

if res == nil then
    return {
        metadata = setmetatable({}, array_mt),
        rows = setmetatable({}, array_mt),
        error = tostring(err or "SQL execution returned nil"),
    }
end

local width = res.metadata and #res.metadata or nil
local rows = setmetatable({}, array_mt)
for _, tuple in ipairs(res.rows or {}) do
    local row = setmetatable({}, array_mt)
    for i = 1, width or #tuple do
        local val = tuple[i]
        if val == nil then
            row[i] = "null"
        elseif type(val) == 'cdata' or type(val) == 'userdata' then
            row[i] = tostring(val)
        else
            row[i] = val
        end
    end
    table.insert(rows, row)
end

return {
    metadata = res.metadata or setmetatable({}, array_mt),
    rows = rows,
    row_count = res.row_count,
}
"#;

/// One statement to run against one target.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueryRequest {
    /// The statement, sent as-is.
    #[serde(rename = "query")]
    pub sql: String,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

/// The shim's reply before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    raw: Value,
}

impl Envelope {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// Runs statements over an open client.
pub struct QueryExecutor<'a> {
    client: &'a mut dyn EngineClient,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(client: &'a mut dyn EngineClient) -> Self {
        Self { client }
    }

    /// Evaluates the shim with `sql` and returns its raw reply.
    ///
    /// A statement the engine rejects still succeeds here; its message is in
    /// the envelope's `error` field.
    pub async fn execute(&mut self, sql: &str) -> Result<Envelope> {
        debug!(len = sql.len(), "Executing statement");
        let raw = self
            .client
            .eval(EVAL_SHIM, vec![Value::from(sql)])
            .await?;
        Ok(Envelope::new(raw))
    }
}
