//! Conditional statement executor (spec §4.4, condition language in §4.10):
//! evaluates branches in order, running the first whose condition is true,
//! falling back to `otherwise`.

use crate::ast::ConditionalStatement;
use crate::condition;
use crate::context::ExecutionContext;
use crate::errors::InterpreterError;
use crate::services::Services;

pub async fn execute(stmt: &ConditionalStatement, ctx: &mut ExecutionContext, services: &Services) -> Result<(), InterpreterError> {
    for branch in &stmt.branches {
        if condition::evaluate(&branch.condition, ctx, services.detector.as_ref()).await {
            return crate::executors::run_body(&branch.body, ctx, services).await;
        }
    }
    crate::executors::run_body(&stmt.otherwise, ctx, services).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ActionKind, ActionStatement, ConditionalBranch, Program, StatementNode};
    use crate::context::ProjectContext;
    use std::sync::{Arc, Mutex};

    struct SinkWriter;
    impl std::io::Write for SinkWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn services() -> Services {
        Services {
            shell: Arc::new(crate::runtime::ProcessShellRunner::default()),
            secrets: Arc::new(crate::runtime::InMemorySecretsStore::default()),
            detector: Arc::new(crate::runtime::ShellDetector::new(crate::runtime::ProcessShellRunner::default())),
            fetcher: Arc::new(crate::runtime::HttpRemoteFetcher::new(Default::default())),
            cache: Arc::new(crate::runtime::TtlIncludeCache::new(true)),
            writer: Arc::new(Mutex::new(SinkWriter)),
            verbose: false,
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Arc::new(ProjectContext::empty("demo")), Arc::new(Program::default()), "demo.drun")
    }

    fn info(msg: &str) -> Vec<StatementNode> {
        vec![StatementNode::Action(ActionStatement {
            action: ActionKind::Info,
            message: msg.into(),
            boxed: false,
            blank_before: false,
            blank_after: false,
        })]
    }

    #[tokio::test]
    async fn first_matching_branch_runs() {
        let svc = services();
        let mut c = ctx();
        c.variables.insert("env".into(), "prod".into());
        let stmt = ConditionalStatement {
            branches: vec![
                ConditionalBranch { condition: "$env is 'dev'".into(), body: info("dev") },
                ConditionalBranch { condition: "$env is 'prod'".into(), body: info("prod") },
            ],
            otherwise: info("other"),
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
    }

    #[tokio::test]
    async fn falls_back_to_otherwise() {
        let svc = services();
        let mut c = ctx();
        let stmt = ConditionalStatement {
            branches: vec![ConditionalBranch { condition: "false".into(), body: info("never") }],
            otherwise: info("fallback"),
        };
        execute(&stmt, &mut c, &svc).await.unwrap();
    }
}
