// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::project::ProjectId;

#[test]
fn name_is_stable_per_variant() {
    let effect = Effect::CancelAgent {
        project_id: ProjectId::new("acme"),
        execution_id: ExecutionId::new("ex-1"),
    };
    assert_eq!(effect.name(), "cancel_agent");
}

#[test]
fn fields_include_execution_id() {
    let effect = Effect::SpawnAgent {
        project_id: ProjectId::new("acme"),
        execution_id: ExecutionId::new("ex-1"),
        agent_type: AgentType::Claude,
        prompt: "fix it".into(),
        resume_session_id: None,
    };
    let fields = effect.fields();
    assert!(fields.contains(&("execution_id", "ex-1".to_string())));
}

#[test]
fn publish_to_bus_field_distinguishes_channel_kind() {
    let exec_effect = Effect::PublishToBus {
        project_id: ProjectId::new("acme"),
        channel: BusChannel::Execution(ExecutionId::new("ex-1")),
    };
    let wf_effect = Effect::PublishToBus {
        project_id: ProjectId::new("acme"),
        channel: BusChannel::Workflow(WorkflowId::new("wf-1")),
    };
    assert_eq!(
        exec_effect.fields(),
        vec![("channel", "execution:ex-1".to_string())]
    );
    assert_eq!(
        wf_effect.fields(),
        vec![("channel", "workflow:wf-1".to_string())]
    );
}
