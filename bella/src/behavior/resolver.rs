use super::model::BehaviorConfig;

/// Picks the persona ID for a user. A direct user assignment wins, then the first of `roles`
/// (in the order given) that has an assignment, then the configured default.
///
/// The caller decides the role order. No other priority between roles is applied.
pub fn select_persona<'a, R>(
    config: &'a BehaviorConfig,
    user_id: &str,
    roles: impl IntoIterator<Item = R>,
) -> &'a str
where
    R: AsRef<str>,
{
    let assignments = &config.assignments;
    if let Some(persona_id) = assignments.users.get(user_id).filter(|id| !id.is_empty()) {
        return persona_id.as_str();
    }

    let by_role = roles
        .into_iter()
        .find_map(|role| assignments.roles.get(role.as_ref()));
    match by_role {
        Some(persona_id) if !persona_id.is_empty() => persona_id.as_str(),
        _ => config.default_persona.as_str(),
    }
}

/// Builds the system instruction for one interaction: the selected persona's prompt, a blank
/// line, then the global guidelines. A persona ID that no longer exists yields an empty prompt.
pub fn resolve_system_instruction<R>(
    config: &BehaviorConfig,
    user_id: &str,
    roles: impl IntoIterator<Item = R>,
) -> String
where
    R: AsRef<str>,
{
    let persona_id = select_persona(config, user_id, roles);
    let prompt = config
        .personas
        .get(persona_id)
        .map(|persona| persona.prompt.as_str())
        .unwrap_or_default();
    format!("{}\n\n{}", prompt, config.global_guidelines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::model::Persona;

    const NO_ROLES: [&str; 0] = [];

    fn config() -> BehaviorConfig {
        let mut config = BehaviorConfig::default();
        for (id, prompt) in [("pA", "Prompt A"), ("pB", "Prompt B"), ("pC", "Prompt C")] {
            config
                .personas
                .insert(id.to_owned(), Persona::new(id, prompt));
        }
        config
            .assignments
            .users
            .insert("u1".to_owned(), "pA".to_owned());
        config
            .assignments
            .roles
            .insert("Admin".to_owned(), "pB".to_owned());
        config.default_persona = "pC".to_owned();
        config.global_guidelines = "Guidelines".to_owned();
        config
    }

    #[test]
    fn test_user_assignment_beats_role() {
        assert_eq!(
            resolve_system_instruction(&config(), "u1", ["Admin"]),
            "Prompt A\n\nGuidelines"
        );
    }

    #[test]
    fn test_role_assignment_beats_default() {
        assert_eq!(
            resolve_system_instruction(&config(), "u2", ["Admin"]),
            "Prompt B\n\nGuidelines"
        );
    }

    #[test]
    fn test_default_without_assignments() {
        assert_eq!(
            resolve_system_instruction(&config(), "u3", NO_ROLES),
            "Prompt C\n\nGuidelines"
        );
    }

    #[test]
    fn test_first_assigned_role_in_caller_order_wins() {
        let mut config = config();
        config
            .assignments
            .roles
            .insert("Member".to_owned(), "pC".to_owned());
        assert_eq!(select_persona(&config, "u9", ["Everyone", "Member", "Admin"]), "pC");
        assert_eq!(select_persona(&config, "u9", ["Admin", "Member"]), "pB");
    }

    #[test]
    fn test_empty_assignments_fall_through() {
        let mut config = config();
        config
            .assignments
            .users
            .insert("u5".to_owned(), String::new());
        config
            .assignments
            .roles
            .insert("Muted".to_owned(), String::new());
        assert_eq!(select_persona(&config, "u5", ["Admin"]), "pB");
        assert_eq!(select_persona(&config, "u5", ["Muted", "Admin"]), "pC");
    }

    #[test]
    fn test_dangling_default_yields_empty_prompt() {
        let mut config = config();
        config.default_persona = "pZ".to_owned();
        assert_eq!(
            resolve_system_instruction(&config, "unknown", NO_ROLES),
            "\n\nGuidelines"
        );
    }

    #[test]
    fn test_dangling_user_assignment_yields_empty_prompt() {
        let mut config = config();
        config.personas.remove("pA");
        assert_eq!(
            resolve_system_instruction(&config, "u1", NO_ROLES),
            "\n\nGuidelines"
        );
    }

    #[test]
    fn test_empty_guidelines_are_not_trimmed() {
        let mut config = config();
        config.global_guidelines = String::new();
        assert_eq!(
            resolve_system_instruction(&config, "u3", NO_ROLES),
            "Prompt C\n\n"
        );
    }

    #[test]
    fn test_accepts_owned_role_names() {
        let roles = vec!["Admin".to_owned()];
        assert_eq!(select_persona(&config(), "u2", &roles), "pB");
    }
}
