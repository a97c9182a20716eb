//! Stack manifest parsing and loading.
//!
//! A manifest is a YAML document describing deployable units grouped into projects,
//! the environments they run in, and the variables their parameters draw on:
//!
//! ```yaml
//! environments: [dev, prod]
//! build-variables:
//!   region: eu-west-1
//! exports:
//!   vpc_id: vpc-0abc
//! accounts:
//!   main: { id: "123456789012", region: "${ref:region}" }
//! projects:
//!   web:
//!     account: main
//!     units:
//!       network:
//!         template: network.yaml
//!         parameters:
//!           Cidr: 10.0.0.0/16
//!           Bucket: { value: "${env:BUCKET}", default_value: fallback }
//!       app:
//!         depends_on: [network]
//!         parameters:
//!           Name: "${func:join(items=['web', 'app'], separator='-')}"
//! ```
//!
//! Loading turns the document into the two engine structures:
//!
//! - every build variable, export and unit parameter becomes a
//!   [`Variable`]; parameters live in the `other` partition under `<unit>.<parameter>`,
//! - every unit becomes an [`Item`] whose scopes are its own `environments`, else the
//!   manifest's, else the default scope, linked to the units it `depends_on`.
//!
//! Parsing is separate from loading: [`Manifest::from_yaml`] only checks syntax, while
//! [`Manifest::validate`] and the `to_*` conversions check cross references.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::{StackyardError, suggest_similar};
use crate::graph::{Item, Items};
use crate::variables::{Classification, ExtraParameters, ValueType, Variable, VariableValue};

/// The parsed manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Manifest {
    /// Scopes every unit joins unless it lists its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_variables: BTreeMap<String, ParameterSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exports: BTreeMap<String, ParameterSpec>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accounts: BTreeMap<String, Account>,

    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

/// A deployment target. `id` is required; every other field is free-form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: VariableValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<VariableValue>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, VariableValue>,
}

impl Account {
    /// Every field by name, `id` and `region` included.
    pub fn fields(&self) -> BTreeMap<&str, &VariableValue> {
        let mut fields: BTreeMap<&str, &VariableValue> =
            self.extra.iter().map(|(k, v)| (k.as_str(), v)).collect();
        fields.insert("id", &self.id);
        if let Some(region) = &self.region {
            fields.insert("region", region);
        }
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    /// Account used by units that do not name their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(default)]
    pub units: BTreeMap<String, Unit>,
}

/// One deployable unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Unit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

/// A parameter, build variable or export value.
///
/// Either a plain scalar, or a mapping with `value`, an optional `type`, and any
/// number of extra keys passed along as extra parameters (`default_value` for `env`
/// snippets, keyword arguments for `func` snippets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSpec {
    Simple(VariableValue),
    Detailed(DetailedParameter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedParameter {
    #[serde(default = "empty_value")]
    pub value: VariableValue,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    #[serde(flatten)]
    pub extra: ExtraParameters,
}

fn empty_value() -> VariableValue {
    VariableValue::Str(String::new())
}

impl ParameterSpec {
    /// Build the variable stored under `(classification, id)`.
    pub fn to_variable(
        &self,
        id: &str,
        classification: Classification,
    ) -> Result<Variable, StackyardError> {
        match self {
            Self::Simple(value) => Ok(Variable::new(id, classification, value.clone())),
            Self::Detailed(detail) => {
                let variable = match detail.value_type {
                    Some(value_type) => Variable::declared(
                        id,
                        classification.as_str(),
                        detail.value.clone(),
                        value_type,
                    )?,
                    None => Variable::new(id, classification, detail.value.clone()),
                };
                Ok(variable.with_extra_parameters(detail.extra.clone()))
            }
        }
    }
}

/// A unit together with the project it is declared in.
#[derive(Debug, Clone, Copy)]
pub struct UnitRef<'a> {
    pub project: &'a str,
    pub name: &'a str,
    pub unit: &'a Unit,
    pub project_account: Option<&'a str>,
}

impl UnitRef<'_> {
    /// The unit's own account, else its project's.
    pub fn account(&self) -> Option<&str> {
        self.unit.account.as_deref().or(self.project_account)
    }
}

/// Store id of a unit parameter.
pub fn parameter_id(unit: &str, parameter: &str) -> String {
    format!("{unit}.{parameter}")
}

impl Manifest {
    /// Parse a YAML document. `location` is only used in error messages.
    pub fn from_yaml(content: &str, location: &str) -> Result<Self, StackyardError> {
        serde_yaml::from_str(content).map_err(|e| StackyardError::ManifestParseError {
            location: location.to_string(),
            reason: e.to_string(),
        })
    }

    /// Units sorted by project name, then unit name.
    pub fn units(&self) -> impl Iterator<Item = UnitRef<'_>> {
        self.projects.iter().flat_map(|(project_name, project)| {
            project.units.iter().map(move |(name, unit)| UnitRef {
                project: project_name,
                name,
                unit,
                project_account: project.account.as_deref(),
            })
        })
    }

    pub fn unit(&self, name: &str) -> Option<UnitRef<'_>> {
        self.units().find(|unit| unit.name == name)
    }

    /// Every environment named anywhere in the manifest, sorted.
    pub fn all_environments(&self) -> Vec<String> {
        let mut environments: Vec<String> = self
            .environments
            .iter()
            .chain(self.units().flat_map(|unit| unit.unit.environments.iter()))
            .cloned()
            .collect();
        environments.sort();
        environments.dedup();
        environments
    }

    /// Check cross references that do not need the engines.
    ///
    /// Unit and account names must not contain `.` (it separates the parts of store
    /// ids). Unit names must be unique across projects, accounts must exist, and
    /// `depends_on` must name declared units.
    pub fn validate(&self) -> Result<(), StackyardError> {
        let units = self.units().map(|unit| ("Unit", unit.name));
        let accounts = self.accounts.keys().map(|name| ("Account", name.as_str()));
        if let Some((kind, name)) = units.chain(accounts).find(|(_, name)| name.contains('.')) {
            return Err(StackyardError::ManifestValidationError {
                reason: format!("{kind} name '{name}' must not contain '.'"),
            });
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for unit in self.units() {
            if let Some(previous) = owners.insert(unit.name, unit.project) {
                return Err(StackyardError::ManifestValidationError {
                    reason: format!(
                        "Unit '{}' is declared in both project '{}' and project '{}'",
                        unit.name, previous, unit.project
                    ),
                });
            }
        }

        for (project_name, project) in &self.projects {
            if let Some(account) = &project.account {
                self.check_account(account, &format!("project '{project_name}'"))?;
            }
        }

        for unit in self.units() {
            if let Some(account) = &unit.unit.account {
                self.check_account(account, &format!("unit '{}'", unit.name))?;
            }
            for dependency in &unit.unit.depends_on {
                if !owners.contains_key(dependency.as_str()) {
                    let suggestions = suggest_similar(dependency, owners.keys().copied());
                    let mut reason = format!(
                        "Unit '{}' depends on '{}', which is not declared",
                        unit.name, dependency
                    );
                    if !suggestions.is_empty() {
                        reason.push_str(&format!(" (did you mean: {}?)", suggestions.join(", ")));
                    }
                    return Err(StackyardError::ManifestValidationError {
                        reason,
                    });
                }
            }
        }

        Ok(())
    }

    fn check_account(&self, account: &str, owner: &str) -> Result<(), StackyardError> {
        if self.accounts.contains_key(account) {
            return Ok(());
        }
        let suggestions = suggest_similar(account, self.accounts.keys().map(String::as_str));
        let mut reason = format!("Account '{account}' used by {owner} is not declared");
        if !suggestions.is_empty() {
            reason.push_str(&format!(" (did you mean: {}?)", suggestions.join(", ")));
        }
        Err(StackyardError::ManifestValidationError {
            reason,
        })
    }

    /// Build variables, exports and unit parameters as store variables.
    pub fn to_variables(&self) -> Result<Vec<Variable>> {
        let mut variables = Vec::new();
        for (id, spec) in &self.build_variables {
            variables.push(
                spec.to_variable(id, Classification::BuildVariable)
                    .with_context(|| format!("Invalid build variable '{id}'"))?,
            );
        }
        for (id, spec) in &self.exports {
            variables.push(
                spec.to_variable(id, Classification::Exports)
                    .with_context(|| format!("Invalid export '{id}'"))?,
            );
        }
        for unit in self.units() {
            for (parameter, spec) in &unit.unit.parameters {
                variables.push(
                    spec.to_variable(&parameter_id(unit.name, parameter), Classification::Other)
                        .with_context(|| {
                            format!("Invalid parameter '{}' of unit '{}'", parameter, unit.name)
                        })?,
                );
            }
        }
        Ok(variables)
    }

    /// One item per unit, scoped and linked to its dependencies.
    pub fn to_items(&self) -> Result<Items> {
        let mut items = Items::new();
        for unit in self.units() {
            items.add_item(Item::new(unit.name));
            let scopes = if unit.unit.environments.is_empty() {
                &self.environments
            } else {
                &unit.unit.environments
            };
            for scope in scopes {
                items.add_scope(unit.name, scope, true)?;
            }
        }

        for unit in self.units() {
            for dependency in &unit.unit.depends_on {
                items.add_link_to_parent(dependency, unit.name).with_context(|| {
                    format!("Invalid dependency of unit '{}' on '{}'", unit.name, dependency)
                })?;
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_SCOPE;

    const SAMPLE: &str = r#"
environments: [dev, prod]
build-variables:
  region: eu-west-1
  replicas: { value: "3", type: int }
exports:
  vpc_id: vpc-0abc
accounts:
  main: { id: "123456789012", region: "${ref:region}", profile: ops }
projects:
  web:
    account: main
    units:
      network:
        template: network.yaml
        parameters:
          Cidr: 10.0.0.0/16
          Public: true
          Bucket: { value: "${env:BUCKET}", default_value: fallback }
      app:
        depends_on: [network]
        environments: [dev]
        parameters:
          Name: "${func:join(items=['web', 'app'], separator='-')}"
"#;

    fn sample() -> Manifest {
        Manifest::from_yaml(SAMPLE, "sample.yaml").unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let manifest = sample();
        assert_eq!(manifest.environments, vec!["dev", "prod"]);
        assert_eq!(manifest.accounts["main"].id, VariableValue::from("123456789012"));
        assert_eq!(manifest.accounts["main"].extra["profile"], VariableValue::from("ops"));

        let names: Vec<&str> = manifest.units().map(|u| u.name).collect();
        assert_eq!(names, vec!["app", "network"]);
        assert_eq!(manifest.unit("app").unwrap().account(), Some("main"));
        manifest.validate().unwrap();
    }

    #[test]
    fn test_account_fields() {
        let manifest = sample();
        let fields = manifest.accounts["main"].fields();
        let keys: Vec<&str> = fields.keys().copied().collect();
        assert_eq!(keys, vec!["id", "profile", "region"]);
    }

    #[test]
    fn test_parse_error_names_location() {
        let err = Manifest::from_yaml("projects: [", "broken.yaml").unwrap_err();
        assert!(matches!(err, StackyardError::ManifestParseError { ref location, .. } if location == "broken.yaml"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "projects:\n  web:\n    units:\n      app:\n        dependson: [x]\n";
        assert!(Manifest::from_yaml(yaml, "m.yaml").is_err());
    }

    #[test]
    fn test_parameters_become_other_variables() {
        let variables = sample().to_variables().unwrap();

        let bucket = variables.iter().find(|v| v.id() == "network.Bucket").unwrap();
        assert_eq!(bucket.classification(), Classification::Other);
        assert_eq!(bucket.extra_parameters()["default_value"], "fallback");

        let public = variables.iter().find(|v| v.id() == "network.Public").unwrap();
        assert_eq!(public.value_type(), ValueType::Bool);

        let replicas = variables.iter().find(|v| v.id() == "replicas").unwrap();
        assert_eq!(replicas.classification(), Classification::BuildVariable);
        assert_eq!(replicas.value_type(), ValueType::Int);

        assert!(variables.iter().any(|v| v.id() == "vpc_id" && v.classification() == Classification::Exports));
    }

    #[test]
    fn test_declared_type_mismatch() {
        let yaml = "build-variables:\n  count: { value: many, type: int }\n";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().to_variables().unwrap_err();
        assert!(format!("{err:#}").contains("count"));
    }

    #[test]
    fn test_items_scopes_and_links() {
        let items = sample().to_items().unwrap();

        let network = items.get_item_by_name("network").unwrap();
        assert!(network.in_scope("dev") && network.in_scope("prod"));

        let app = items.get_item_by_name("app").unwrap();
        assert!(app.in_scope("dev") && !app.in_scope("prod"));
        assert_eq!(app.parent_names(), ["network"]);
    }

    #[test]
    fn test_items_default_scope_without_environments() {
        let yaml = "projects:\n  p:\n    units:\n      a: {}\n      b: { depends_on: [a] }\n";
        let items = Manifest::from_yaml(yaml, "m.yaml").unwrap().to_items().unwrap();
        assert!(items.get_item_by_name("a").unwrap().in_scope(DEFAULT_SCOPE));
        assert_eq!(items.get_item_by_name("b").unwrap().parent_names(), ["a"]);
    }

    #[test]
    fn test_link_without_shared_scope_fails() {
        let yaml = r"
projects:
  p:
    units:
      seed: { environments: [dev] }
      app: { environments: [prod], depends_on: [seed] }
";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().to_items().unwrap_err();
        assert!(err.chain().any(|c| matches!(
            c.downcast_ref::<StackyardError>(),
            Some(StackyardError::NoSharedScope { .. })
        )));
    }

    #[test]
    fn test_validate_missing_account() {
        let yaml = "projects:\n  p:\n    account: mian\n    units: {}\naccounts:\n  main: { id: '1' }\n";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'mian'"));
        assert!(message.contains("did you mean: main?"));
    }

    #[test]
    fn test_validate_duplicate_unit() {
        let yaml = "projects:\n  a:\n    units:\n      x: {}\n  b:\n    units:\n      x: {}\n";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("declared in both"));
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let yaml = "projects:\n  p:\n    units:\n      app: { depends_on: [netwrok] }\n      network: {}\n";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("did you mean: network?"));
    }

    #[test]
    fn test_validate_rejects_dotted_names() {
        let yaml = "projects:\n  p:\n    units:\n      a: { parameters: { b.c: x } }\n      a.b: { parameters: { c: y } }\n";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("Unit name 'a.b' must not contain '.'"));

        let yaml = "accounts:\n  main.eu: { id: '1' }\nprojects: {}\n";
        let err = Manifest::from_yaml(yaml, "m.yaml").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("Account name 'main.eu'"));

        let yaml = "projects:\n  p:\n    units:\n      a: { parameters: { b.c: x } }\n";
        Manifest::from_yaml(yaml, "m.yaml").unwrap().validate().unwrap();
    }

    #[test]
    fn test_all_environments() {
        let yaml = "environments: [prod]\nprojects:\n  p:\n    units:\n      a: { environments: [dev, qa] }\n";
        let manifest = Manifest::from_yaml(yaml, "m.yaml").unwrap();
        assert_eq!(manifest.all_environments(), vec!["dev", "prod", "qa"]);
    }
}
