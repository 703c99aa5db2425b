use anyhow::Context;
use futures::future::LocalBoxFuture;
use serde::Deserialize;

use crate::aws::{AwsCli, StackDescriber, StackDescription, StackOutput};
use crate::diagnose::failure::StackEvent;
use crate::observer::ObserveResult;

/// CloudFormation stacks of one region.
pub struct CloudFormationStacks {
    cli: AwsCli,
}

impl CloudFormationStacks {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    /// Events of the stack, newest first.
    pub async fn stack_events(&self, stack_name: &str) -> ObserveResult<Vec<StackEvent>> {
        let output: DescribeStackEventsOutput = self
            .cli
            .call(
                "cloudformation",
                "describe-stack-events",
                stack_name_argument(stack_name),
            )
            .await?;
        Ok(output.stack_events)
    }

    pub async fn stack_outputs(&self, stack_name: &str) -> ObserveResult<Vec<StackOutput>> {
        let output: DescribeStacksOutput = self
            .cli
            .call(
                "cloudformation",
                "describe-stacks",
                stack_name_argument(stack_name),
            )
            .await?;
        let stack = output
            .stacks
            .into_iter()
            .next()
            .with_context(|| format!("Stack {stack_name} was not found"))?;
        Ok(stack.outputs)
    }
}

fn stack_name_argument(stack_name: &str) -> Vec<String> {
    vec!["--stack-name".to_string(), stack_name.to_string()]
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksOutput {
    #[serde(default)]
    stacks: Vec<Stack>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Stack {
    #[serde(default)]
    outputs: Vec<StackOutput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStackEventsOutput {
    #[serde(default)]
    stack_events: Vec<StackEvent>,
}

impl StackDescriber for CloudFormationStacks {
    fn describe_stack<'a>(
        &'a self,
        stack_name: &'a str,
    ) -> LocalBoxFuture<'a, ObserveResult<StackDescription>> {
        Box::pin(async move {
            let outputs = self.stack_outputs(stack_name).await?;
            let events = self.stack_events(stack_name).await?;
            Ok(StackDescription { outputs, events })
        })
    }
}
