//! AST node types for a drun program.
//!
//! This mirrors the shape an external parser hands the engine (see the crate
//! root docs). Every node derives `Deserialize` so a program can be supplied
//! as a YAML or JSON fixture directly — useful for embedders and tests that
//! have no parser on hand.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Top-level parsed program: a project declaration plus its tasks and
/// templates. `project` is optional so a bare collection of tasks (no
/// project-level settings or includes) still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub project: Option<ProjectNode>,
    #[serde(default)]
    pub tasks: Vec<TaskNode>,
    #[serde(default)]
    pub templates: Vec<TemplateNode>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub settings: IndexMap<String, String>,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub snippets: Vec<SnippetNode>,
    #[serde(default)]
    pub includes: Vec<IncludeNode>,
    #[serde(default)]
    pub hooks: HooksNode,
    #[serde(default)]
    pub platforms: IndexMap<String, PlatformShellNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HooksNode {
    #[serde(default)]
    pub setup: Vec<StatementNode>,
    #[serde(default)]
    pub teardown: Vec<StatementNode>,
    #[serde(default)]
    pub before_task: Vec<StatementNode>,
    #[serde(default)]
    pub after_task: Vec<StatementNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformShellNode {
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeNode {
    pub path: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub selectors: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub depends_on: Vec<DependencyGroup>,
    #[serde(default)]
    pub body: Vec<StatementNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub body: Vec<StatementNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetNode {
    pub name: String,
    #[serde(default)]
    pub body: Vec<StatementNode>,
}

/// A declared dependency group. `sequential = true` (the default) means the
/// names in it are ordered relative to each other; `false` marks them as
/// independent and eligible for concurrent execution by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGroup {
    pub names: Vec<String>,
    #[serde(default = "default_true")]
    pub sequential: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    List,
    Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterConstraint {
    #[serde(default)]
    pub allowed: Option<Vec<String>>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub pattern_macro: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub name: String,
    #[serde(default)]
    pub param_type: Option<ParameterType>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub constraint: Option<ParameterConstraint>,
}

/// Every statement kind the dispatcher routes to an executor (spec §4.4).
/// `Parameter` is carried for completeness of the dispatch table; it is a
/// no-op at execution time since parameter declarations are consumed during
/// binding (§4.3), before the body ever runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementNode {
    Action(ActionStatement),
    Shell(ShellStatement),
    FileOp(FileOpStatement),
    Try(TryStatement),
    Throw(ThrowStatement),
    Rethrow,
    Ignore,
    Docker(ExternalToolStatement),
    Git(ExternalToolStatement),
    Http(HttpStatement),
    Download(DownloadStatement),
    NetworkProbe(NetworkProbeStatement),
    Detect(DetectStatement),
    Break(LoopControlStatement),
    Continue(LoopControlStatement),
    VariableOp(VariableOpStatement),
    Parameter(ParameterNode),
    Conditional(ConditionalStatement),
    Loop(LoopStatement),
    TaskCall(TaskCallStatement),
    SnippetUse(SnippetUseStatement),
    TemplateInstantiate(TemplateInstantiateStatement),
    Secret(SecretStatement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Info,
    Step,
    Warn,
    Error,
    Success,
    Fail,
    Echo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatement {
    pub action: ActionKind,
    pub message: String,
    #[serde(default)]
    pub boxed: bool,
    #[serde(default)]
    pub blank_before: bool,
    #[serde(default)]
    pub blank_after: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellStatement {
    pub lines: Vec<String>,
    #[serde(default)]
    pub capture: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Copy,
    Move,
    Remove,
    Mkdir,
    Read,
    Write,
    Append,
    Chmod,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOpStatement {
    pub op: FileOp,
    pub path: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub capture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_var: Option<String>,
    #[serde(default)]
    pub body: Vec<StatementNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    #[serde(default)]
    pub try_body: Vec<StatementNode>,
    #[serde(default)]
    pub catches: Vec<CatchClause>,
    #[serde(default)]
    pub finally_body: Vec<StatementNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub message: String,
}

/// Shared shape for `docker` and `git` statements: both shell out to an
/// external CLI and capture its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalToolStatement {
    pub subcommand: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub capture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpStatement {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub capture: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatement {
    pub url: String,
    pub to: String,
    #[serde(default)]
    pub extract: bool,
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProbeStatement {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub capture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectKind {
    ProjectType,
    ToolAvailable,
    ToolVersion,
    Environment,
    CompareVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectStatement {
    pub detect: DetectKind,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub compare_op: Option<String>,
    #[serde(default)]
    pub compare_value: Option<String>,
    #[serde(default)]
    pub capture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopControlStatement {
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableOp {
    Let,
    Set,
    Transform,
    CaptureFromShell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableOpStatement {
    pub op: VariableOp,
    pub name: String,
    #[serde(default)]
    pub expr: Option<ExpressionNode>,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub shell_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub condition: String,
    #[serde(default)]
    pub body: Vec<StatementNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalStatement {
    pub branches: Vec<ConditionalBranch>,
    #[serde(default)]
    pub otherwise: Vec<StatementNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopKind {
    Each,
    Range,
    Line,
    Match,
}

impl Default for LoopKind {
    fn default() -> Self {
        LoopKind::Each
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum LoopSource {
    ArrayLiteral { items: Vec<String> },
    Variable { name: String },
    Parameter { name: String },
    GlobalSetting { key: String },
    Range { start: String, end: String, step: Option<String> },
    File { path: String },
    Pattern { regex: String, input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhereOp {
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Eq,
    Neq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereFilter {
    pub op: WhereOp,
    pub arg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelOptions {
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatement {
    #[serde(default)]
    pub kind: LoopKind,
    pub var_name: String,
    pub source: LoopSource,
    #[serde(default)]
    pub where_filter: Option<WhereFilter>,
    #[serde(default)]
    pub parallel: Option<ParallelOptions>,
    #[serde(default)]
    pub body: Vec<StatementNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCallStatement {
    pub name: String,
    #[serde(default)]
    pub args: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetUseStatement {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateInstantiateStatement {
    pub template: String,
    pub task_name: String,
    #[serde(default)]
    pub overrides: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretOp {
    Set,
    Get,
    Delete,
    Exists,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretStatement {
    pub op: SecretOp,
    pub namespace: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub capture: Option<String>,
}

/// Expression AST consumed by the expression evaluator (spec §4.9) — used by
/// `let`/`set`/`capture`, distinct from the `{...}` interpolation grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr_kind", rename_all = "snake_case")]
pub enum ExpressionNode {
    Literal(String),
    Identifier(String),
    Binary {
        op: BinaryOp,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<ExpressionNode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
}
