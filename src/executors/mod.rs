//! Statement dispatcher (spec §4.4): a single multi-way branch over the AST
//! node variant, each variant routed to its own executor module. Modeled as
//! a closed match over a tagged-variant enum (spec §9 "Dynamic dispatch over
//! AST variants") rather than reflection or a trait-object visitor.

pub mod action;
pub mod conditional;
pub mod detect;
pub mod external_tool;
pub mod fileop;
pub mod http;
pub mod loop_engine;
pub mod network_probe;
pub mod secret;
pub mod shell;
pub mod task_call;
pub mod trycatch;
pub mod variable_op;

use std::pin::Pin;

use crate::ast::StatementNode;
use crate::context::ExecutionContext;
use crate::errors::InterpreterError;
use crate::services::Services;

pub type DispatchFuture<'a> = Pin<Box<dyn std::future::Future<Output = Result<(), InterpreterError>> + Send + 'a>>;

/// Runs a statement body in source order (spec §5 "Within a task body,
/// statements execute in source order"), stopping at the first error.
pub fn run_body<'a>(body: &'a [StatementNode], ctx: &'a mut ExecutionContext, services: &'a Services) -> DispatchFuture<'a> {
    Box::pin(async move {
        for stmt in body {
            dispatch(stmt, ctx, services).await?;
        }
        Ok(())
    })
}

pub fn dispatch<'a>(stmt: &'a StatementNode, ctx: &'a mut ExecutionContext, services: &'a Services) -> DispatchFuture<'a> {
    Box::pin(async move {
        match stmt {
            StatementNode::Action(s) => action::execute(s, ctx, services),
            StatementNode::Shell(s) => shell::execute(s, ctx, services).await,
            StatementNode::FileOp(s) => fileop::execute(s, ctx, services).await,
            StatementNode::Try(s) => trycatch::execute(s, ctx, services).await,
            StatementNode::Throw(s) => trycatch::execute_throw(s, ctx),
            StatementNode::Rethrow => trycatch::execute_rethrow(ctx),
            StatementNode::Ignore => Ok(()),
            StatementNode::Docker(s) => external_tool::execute(s, "docker", ctx, services).await,
            StatementNode::Git(s) => external_tool::execute(s, "git", ctx, services).await,
            StatementNode::Http(s) => http::execute(s, ctx, services).await,
            StatementNode::Download(s) => http::execute_download(s, ctx, services).await,
            StatementNode::NetworkProbe(s) => network_probe::execute(s, ctx, services).await,
            StatementNode::Detect(s) => detect::execute(s, ctx, services).await,
            StatementNode::Break(s) => loop_engine::execute_break(s, ctx, services).await,
            StatementNode::Continue(s) => loop_engine::execute_continue(s, ctx, services).await,
            StatementNode::VariableOp(s) => variable_op::execute(s, ctx, services).await,
            StatementNode::Parameter(_) => Ok(()),
            StatementNode::Conditional(s) => conditional::execute(s, ctx, services).await,
            StatementNode::Loop(s) => loop_engine::execute(s, ctx, services).await,
            StatementNode::TaskCall(s) => task_call::execute_call(s, ctx, services).await,
            StatementNode::SnippetUse(s) => task_call::execute_snippet(s, ctx, services).await,
            StatementNode::TemplateInstantiate(s) => task_call::execute_template(s, ctx, services).await,
            StatementNode::Secret(s) => secret::execute(s, ctx, services).await,
        }
    })
}
