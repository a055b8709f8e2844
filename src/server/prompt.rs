//! System prompt assembly.

use super::auth::Principal;

const BASE_PROMPT: &str = "\
You are a B2B prospecting assistant. You help the user find leads that match \
their ideal customer profile (ICP), qualify them, draft personalised outreach \
and run email campaigns.

## How you work
1. When the user describes who they want to reach, call parse_icp with their \
description to get structured search filters.
2. Call count_leads with those filters before anything else. If the count had \
to be broadened, tell the user which criteria were relaxed.
3. Show a few examples with preview_leads and ask whether the targeting looks right.
4. Only call source_leads once the user confirms, and never for more leads \
than they asked for.
5. Use score_lead to qualify leads, then enrich_lead on the qualified ones \
to learn about their company.
6. Call generate_campaign_angle once per campaign and let the user validate \
it, then draft_email to write a three-step sequence (steps 0, 1 and 2), \
passing the angle and each lead's enrichment.
7. create_campaign creates a draft. Never call activate_campaign unless the \
user explicitly asks to start sending.

## Style
- Answer in the user's language.
- Be concise. Use short lists for leads and numbers.
- Never invent lead data, counts or campaign ids; use tool results.
- When a tool returns an error, explain it briefly and suggest a next step.";

/// Prompt for one request: base instructions, the caller's company and
/// its connected integrations.
pub fn build_system_prompt(principal: &Principal) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    prompt.push_str("\n\n## Your client's company\n");
    if let Some(name) = principal.workspace_name.as_deref().filter(|n| !n.trim().is_empty()) {
        prompt.push_str(&format!("Workspace: {name}\n"));
    }
    match principal.company_pitch.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(pitch) => prompt.push_str(pitch.trim()),
        None => prompt.push_str(
            "No company profile yet. Ask the user to configure it in Settings before drafting emails.",
        ),
    }

    prompt.push_str("\n\n## Connected integrations\n");
    if principal.platform.is_some() {
        prompt.push_str("- Prospecting platform: lead search, sourcing and campaign sending");
    } else {
        prompt.push_str(
            "None yet. Lead search and campaigns are unavailable until the user connects a \
             prospecting platform in Settings.",
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::FakePlatform;

    fn principal() -> Principal {
        Principal {
            workspace_id: "ws_1".into(),
            user_id: "user_1".into(),
            workspace_name: Some("Acme".into()),
            company_pitch: Some("Acme sells revenue analytics to SaaS teams.".into()),
            platform: None,
        }
    }

    #[test]
    fn test_prompt_includes_company_context() {
        let prompt = build_system_prompt(&principal());
        assert!(prompt.starts_with("You are a B2B prospecting assistant."));
        assert!(prompt.contains("## Your client's company\nWorkspace: Acme\nAcme sells"));
        assert!(prompt.contains("## Connected integrations\nNone yet."));
    }

    #[test]
    fn test_prompt_lists_connected_platform() {
        let mut principal = principal();
        principal.company_pitch = None;
        principal.platform = Some(Arc::new(FakePlatform::default()));
        let prompt = build_system_prompt(&principal);
        assert!(prompt.contains("No company profile yet."));
        assert!(prompt.contains("- Prospecting platform"));
    }
}
