//! Projection of the catalog into remote command definitions.

use std::sync::Arc;

use cog_core::{OptionKind, RemoteChoice, RemoteCommand, RemoteOption, Translations};
use tracing::{debug, warn};

use super::args::{ArgKind, ArgumentSpec, Choices};
use super::catalog::CommandCatalog;
use super::definition::CommandDefinition;
use crate::error::{CatalogError, CatalogResult};

impl CommandCatalog {
    /// Builds the payload registered with the platform.
    ///
    /// Includes every top-level command whose mode accepts structured input,
    /// with its sub-commands nested as `SubCommand` options. Descriptions are
    /// read in the default language.
    pub fn build_remote_definitions(
        &self,
        translations: &Translations,
    ) -> CatalogResult<Vec<RemoteCommand>> {
        let all = self.get_all();
        let language = translations.default_language();

        let has_parent = |parent: &str| {
            all.iter()
                .any(|p| p.parent_name().is_none() && p.command_name() == parent)
        };
        for orphan in all
            .iter()
            .filter(|def| def.parent_name().is_some_and(|parent| !has_parent(parent)))
        {
            warn!(command = %orphan.key(), "Sub-command has no parent, skipped");
        }

        let mut commands = Vec::new();
        for def in all.iter().filter(|def| def.parent_name().is_none()) {
            if !def.trigger_mode().publishes_structured() {
                continue;
            }

            let mut options = Vec::new();
            for child in all
                .iter()
                .filter(|c| c.parent_name() == Some(def.command_name()))
            {
                if !child.trigger_mode().publishes_structured() {
                    continue;
                }
                options.push(RemoteOption {
                    name: child.command_name().to_string(),
                    description: describe(child, translations, language),
                    kind: OptionKind::SubCommand,
                    required: false,
                    choices: None,
                    options: arg_options(child, translations, language)?,
                });
            }
            options.extend(arg_options(def, translations, language)?);

            commands.push(RemoteCommand {
                name: def.command_name().to_string(),
                description: describe(def, translations, language),
                options,
            });
        }

        debug!(count = commands.len(), "Built remote command definitions");
        Ok(commands)
    }
}

fn describe(def: &Arc<CommandDefinition>, translations: &Translations, language: &str) -> String {
    match def.description_override() {
        Some(text) => text.to_string(),
        None => translations.get(&format!("{}.description", def.namespace()), language, &[]),
    }
}

fn arg_options(
    def: &CommandDefinition,
    translations: &Translations,
    language: &str,
) -> CatalogResult<Vec<RemoteOption>> {
    def.arg_specs()
        .iter()
        .map(|arg| {
            Ok(RemoteOption {
                name: arg.name().to_string(),
                description: translations.get(
                    &format!("{}.args.{}.description", def.namespace(), arg.name()),
                    language,
                    &[],
                ),
                kind: option_kind(def, arg)?,
                required: !arg.is_optional(),
                choices: arg.choice_set().map(remote_choices),
                options: Vec::new(),
            })
        })
        .collect()
}

fn option_kind(def: &CommandDefinition, arg: &ArgumentSpec) -> CatalogResult<OptionKind> {
    match arg.kind() {
        ArgKind::String => Ok(OptionKind::String),
        ArgKind::User | ArgKind::Member => Ok(OptionKind::User),
        ArgKind::Channel => Ok(OptionKind::Channel),
        ArgKind::Role => Ok(OptionKind::Role),
        ArgKind::Other(kind) => Err(CatalogError::UnsupportedArgumentKind {
            command: def.key(),
            argument: arg.name().to_string(),
            kind: kind.clone(),
        }),
    }
}

fn remote_choices(choices: &Choices) -> Vec<RemoteChoice> {
    choices
        .resolve()
        .into_iter()
        .map(|choice| RemoteChoice {
            name: choice.name,
            value: choice.value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Choice, Command, TriggerMode};
    use crate::router::ExecutionRequest;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Command for Noop {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn def(name: &str) -> CommandDefinition {
        CommandDefinition::new(Noop).name(name)
    }

    #[test]
    fn test_projection_nests_subcommands_and_translates() {
        let catalog = CommandCatalog::new();
        catalog.set(def("role"));
        catalog.set(
            def("add")
                .parent("role")
                .arg(ArgumentSpec::member("target"))
                .arg(ArgumentSpec::role("role").optional()),
        );
        catalog.set(def("legacy").mode(TriggerMode::Text));

        let translations = Translations::new();
        translations.set("command.role.description", "en", "Manage roles");
        translations.set("command.role.add.description", "en", "Give a role");
        translations.set("command.role.add.args.target.description", "en", "Who");

        let remote = catalog.build_remote_definitions(&translations).unwrap();

        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].name, "role");
        assert_eq!(remote[0].description, "Manage roles");
        let sub = &remote[0].options[0];
        assert_eq!(sub.kind, OptionKind::SubCommand);
        assert_eq!(sub.description, "Give a role");
        assert_eq!(sub.options[0].kind, OptionKind::User);
        assert_eq!(sub.options[0].description, "Who");
        assert!(sub.options[0].required);
        assert_eq!(sub.options[1].kind, OptionKind::Role);
        assert!(!sub.options[1].required);
    }

    #[test]
    fn test_dynamic_choices_and_description_override() {
        let catalog = CommandCatalog::new();
        catalog.set(
            def("color")
                .description("Pick a color")
                .arg(
                    ArgumentSpec::string("value")
                        .dynamic_choices(|| vec![Choice::new("Red", "red")]),
                ),
        );

        let remote = catalog.build_remote_definitions(&Translations::new()).unwrap();

        assert_eq!(remote[0].description, "Pick a color");
        let choices = remote[0].options[0].choices.as_ref().unwrap();
        assert_eq!(choices[0].value, "red");
    }

    #[test]
    fn test_unknown_kind_is_a_hard_error() {
        let catalog = CommandCatalog::new();
        catalog.set(def("react").arg(ArgumentSpec::new("emoji", ArgKind::Other("emoji".into()))));

        let err = catalog.build_remote_definitions(&Translations::new()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnsupportedArgumentKind { ref kind, .. } if kind == "emoji"
        ));
    }

    #[test]
    fn test_orphan_subcommand_skipped() {
        let catalog = CommandCatalog::new();
        catalog.set(def("add").parent("missing"));

        let remote = catalog.build_remote_definitions(&Translations::new()).unwrap();
        assert!(remote.is_empty());
    }
}
