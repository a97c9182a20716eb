//! Deployment planning for one environment.
//!
//! The [`Planner`] loads a [`Manifest`] into a [`VariableStore`] and an [`Items`]
//! graph, then answers two questions for a single environment:
//!
//! - in which order the units deploy ([`Planner::order`]),
//! - what every unit parameter resolves to ([`Planner::plan`]).
//!
//! # Loading
//!
//! 1. The manifest is cross-checked ([`Manifest::validate`]).
//! 2. A `build-variable` named `environment` holding the planned environment is added
//!    unless the manifest declares one.
//! 3. Account fields are resolved first, then exposed through the `account(name,
//!    field)` function, whose fixed `accounts` parameter carries the resolved table.
//! 4. Units become scoped, linked items.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackyard::manifest::Manifest;
//! use stackyard::planner::Planner;
//! use stackyard::variables::ResolveContext;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manifest = Manifest::from_yaml("projects: {}", "inline")?;
//! let planner = Planner::load(manifest, None, ResolveContext::default()).await?;
//! let plan = planner.plan(None).await?;
//! assert!(plan.units.is_empty());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result, bail};
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::{ACCOUNT_FUNCTION, DEFAULT_SCOPE, ENVIRONMENT_VARIABLE};
use crate::core::{StackyardError, suggest_similar};
use crate::functions::{FunctionArgs, optional_str, required_str};
use crate::graph::{Items, order_for_scope, scope_cycles};
use crate::manifest::{Manifest, UnitRef, parameter_id};
use crate::variables::{
    Classification, FunctionCall, ResolveContext, Snippet, Variable, VariableStore,
    VariableValue, extract_snippets,
};

/// Resolved account fields, by account name.
pub type AccountTable = BTreeMap<String, BTreeMap<String, String>>;

/// A manifest loaded for one environment.
pub struct Planner {
    manifest: Manifest,
    environment: String,
    items: Items,
    store: VariableStore,
    accounts: AccountTable,
}

/// Ordered, resolved units of one environment.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub environment: String,
    pub units: Vec<PlannedUnit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedUnit {
    pub name: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<PlannedAccount>,
    /// Parents that are part of the planned environment.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedAccount {
    pub name: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// Problems found by [`Planner::validate`].
///
/// Errors make `stackyard validate` fail; warnings are printed only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub environment: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Pick the environment to plan.
///
/// An explicit environment must be named somewhere in the manifest. Without one, a
/// manifest that names no environment plans the default scope and a manifest that
/// names exactly one plans that one.
pub fn select_environment(manifest: &Manifest, requested: Option<&str>) -> Result<String> {
    let known = manifest.all_environments();
    match requested {
        Some(environment) if known.iter().any(|e| e == environment) => Ok(environment.to_string()),
        Some(environment) if known.is_empty() && environment == DEFAULT_SCOPE => {
            Ok(environment.to_string())
        }
        Some(environment) if known.is_empty() => {
            bail!("Environment '{environment}' is not declared: the manifest names no environments")
        }
        Some(environment) => {
            let suggestions = suggest_similar(environment, known.iter().map(String::as_str));
            let mut message = format!(
                "Environment '{}' is not declared (known: {})",
                environment,
                known.join(", ")
            );
            if !suggestions.is_empty() {
                message.push_str(&format!(". Did you mean: {}?", suggestions.join(", ")));
            }
            bail!(message)
        }
        None => match known.as_slice() {
            [] => Ok(DEFAULT_SCOPE.to_string()),
            [only] => Ok(only.clone()),
            _ => bail!("Choose an environment with --env (one of: {})", known.join(", ")),
        },
    }
}

impl Planner {
    /// Load `manifest` for `environment` (see [`select_environment`]).
    pub async fn load(
        manifest: Manifest,
        environment: Option<&str>,
        context: ResolveContext,
    ) -> Result<Self> {
        manifest.validate()?;
        let environment = select_environment(&manifest, environment)?;
        tracing::debug!("Loading manifest for environment '{}'", environment);

        let mut variables = manifest.to_variables()?;
        if !manifest.build_variables.contains_key(ENVIRONMENT_VARIABLE) {
            variables.push(Variable::new(
                ENVIRONMENT_VARIABLE,
                Classification::BuildVariable,
                environment.as_str(),
            ));
        }

        let accounts = resolve_accounts(&manifest, &variables, context.clone()).await?;

        let mut functions = (*context.functions).clone();
        functions.register_with_parameters(ACCOUNT_FUNCTION, account_parameters(&accounts), account);
        let context = ResolveContext {
            functions: Arc::new(functions),
            ..context
        };

        let mut store = VariableStore::new(context);
        for variable in variables {
            store.add(variable)?;
        }

        let items = manifest.to_items()?;

        Ok(Self {
            manifest,
            environment,
            items,
            store,
            accounts,
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub const fn items(&self) -> &Items {
        &self.items
    }

    pub const fn store(&self) -> &VariableStore {
        &self.store
    }

    pub const fn accounts(&self) -> &AccountTable {
        &self.accounts
    }

    /// Deployment order.
    ///
    /// With `start`, the order needed to deploy that unit. Without, every unit of the
    /// environment: units are visited sorted by project name, then unit name, and each
    /// one's order is appended, skipping units already placed.
    pub fn order(&self, start: Option<&str>) -> Result<Vec<String>> {
        if let Some(start) = start {
            return Ok(order_for_scope(&self.items, &self.environment, start)?);
        }

        let mut order: Vec<String> = Vec::new();
        for item in self.items.iter().filter(|item| item.in_scope(&self.environment)) {
            if order.iter().any(|placed| placed == item.name()) {
                continue;
            }
            for name in order_for_scope(&self.items, &self.environment, item.name())? {
                if !order.contains(&name) {
                    order.push(name);
                }
            }
        }
        Ok(order)
    }

    /// Resolve every parameter of `unit`.
    pub async fn resolve_parameters(&self, unit: &str) -> Result<BTreeMap<String, String>> {
        let unit_ref = self.unit(unit)?;
        let resolutions = unit_ref.unit.parameters.keys().map(|parameter| async move {
            let id = parameter_id(unit, parameter);
            let value = self
                .store
                .resolve(&id, Classification::Other, false)
                .await
                .with_context(|| format!("Failed to resolve parameter '{parameter}' of unit '{unit}'"))?;
            Ok::<_, anyhow::Error>((parameter.clone(), value))
        });
        Ok(try_join_all(resolutions).await?.into_iter().collect())
    }

    /// Order and resolve the environment, or only what `start` needs.
    pub async fn plan(&self, start: Option<&str>) -> Result<Plan> {
        let order = self.order(start)?;
        tracing::info!("Planning {} unit(s) for '{}'", order.len(), self.environment);

        let units = try_join_all(order.iter().map(|name| self.plan_unit(name))).await?;
        Ok(Plan {
            environment: self.environment.clone(),
            units,
        })
    }

    async fn plan_unit(&self, name: &str) -> Result<PlannedUnit> {
        let unit = self.unit(name)?;
        let parameters = self.resolve_parameters(name).await?;

        let account = unit.account().map(|account| PlannedAccount {
            name: account.to_string(),
            fields: self.accounts.get(account).cloned().unwrap_or_default(),
        });

        let depends_on = self
            .items
            .get_item_by_name(name)?
            .parent_names()
            .iter()
            .filter(|parent| {
                self.items
                    .get_item_by_name(parent)
                    .is_ok_and(|item| item.in_scope(&self.environment))
            })
            .cloned()
            .collect();

        Ok(PlannedUnit {
            name: name.to_string(),
            project: unit.project.to_string(),
            template: unit.unit.template.clone(),
            account,
            depends_on,
            parameters,
        })
    }

    fn unit(&self, name: &str) -> Result<UnitRef<'_>, StackyardError> {
        self.manifest.unit(name).ok_or_else(|| StackyardError::ItemNotFound {
            name: name.to_string(),
            suggestions: suggest_similar(name, self.manifest.units().map(|u| u.name)),
        })
    }

    /// Check the loaded manifest without resolving anything.
    ///
    /// Errors: references to unregistered functions, undeclared build variables or
    /// exports, and unsupported snippet tags. Warnings: dependency cycles, dependencies
    /// outside the environment, and `func` arguments that do not parse.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport {
            environment: self.environment.clone(),
            ..ValidationReport::default()
        };

        for classification in [Classification::BuildVariable, Classification::Exports, Classification::Other] {
            let mut variables: Vec<&Variable> = self.store.variables(classification).collect();
            variables.sort_by(|a, b| a.id().cmp(b.id()));
            for variable in variables {
                if let VariableValue::Str(raw) = variable.raw_value() {
                    let owner = format!("{} '{}'", classification, variable.id());
                    self.check_snippets(raw, &owner, &mut report);
                }
            }
        }

        for cycle in scope_cycles(&self.items, &self.environment) {
            report.warnings.push(format!(
                "Dependency cycle in '{}' between units: {}",
                self.environment,
                cycle.join(", ")
            ));
        }

        for item in self.items.iter().filter(|item| item.in_scope(&self.environment)) {
            for parent in item.parent_names() {
                let in_scope = self
                    .items
                    .get_item_by_name(parent)
                    .is_ok_and(|parent| parent.in_scope(&self.environment));
                if !in_scope {
                    report.warnings.push(format!(
                        "Unit '{}' depends on '{}', which is not part of '{}'",
                        item.name(),
                        parent,
                        self.environment
                    ));
                }
            }
        }

        report
    }

    fn check_snippets(&self, line: &str, owner: &str, report: &mut ValidationReport) {
        for snippet in extract_snippets(line) {
            self.check_snippets(&snippet, owner, report);

            let snippet = match Snippet::parse(&snippet) {
                Ok(snippet) => snippet,
                Err(err) => {
                    report.errors.push(format!("{owner}: {err}"));
                    continue;
                }
            };

            // Names built from inner placeholders are only known after resolution.
            match snippet {
                Snippet::Ref {
                    id,
                } if !id.contains("${") => {
                    self.check_variable(id, Classification::BuildVariable, owner, report);
                }
                Snippet::Stored {
                    classification,
                    id,
                } if !id.contains("${") => {
                    self.check_variable(id, classification, owner, report);
                }
                Snippet::Func {
                    call,
                } => self.check_call(call, owner, report),
                _ => {}
            }
        }
    }

    fn check_variable(
        &self,
        id: &str,
        classification: Classification,
        owner: &str,
        report: &mut ValidationReport,
    ) {
        if let Err(err) = self.store.get(id, classification) {
            report.errors.push(format!("{owner}: {}", err.with_hint()));
        }
    }

    fn check_call(&self, call: &str, owner: &str, report: &mut ValidationReport) {
        let name = match FunctionCall::parse_name(call) {
            Ok(name) => name,
            Err(err) => {
                report.errors.push(format!("{owner}: {err}"));
                return;
            }
        };

        let functions = &self.store.context().functions;
        if !functions.contains(&name) {
            let err = StackyardError::FunctionNotRegistered {
                suggestions: suggest_similar(&name, functions.names()),
                name,
            };
            report.errors.push(format!("{owner}: {}", err.with_hint()));
            return;
        }

        if !call.contains("${") {
            if let Err(err) = FunctionCall::parse(call) {
                report.warnings.push(format!("{owner}: {err}"));
            }
        }
    }
}

async fn resolve_accounts(
    manifest: &Manifest,
    variables: &[Variable],
    context: ResolveContext,
) -> Result<AccountTable> {
    let mut store = VariableStore::new(context);
    for variable in variables {
        store.add(variable.clone())?;
    }

    let mut fields = Vec::new();
    for (name, account) in &manifest.accounts {
        for (field, value) in account.fields() {
            let id = format!("{ACCOUNT_FUNCTION}.{name}.{field}");
            store.add(Variable::new(id.clone(), Classification::Other, value.clone()))?;
            fields.push((name.as_str(), field, id));
        }
    }

    let store = &store;
    let resolved = try_join_all(fields.into_iter().map(|(name, field, id)| async move {
        let value = store
            .resolve(&id, Classification::Other, false)
            .await
            .with_context(|| format!("Failed to resolve field '{field}' of account '{name}'"))?;
        Ok::<_, anyhow::Error>((name, field, value))
    }))
    .await?;

    let mut accounts = AccountTable::new();
    for (name, field, value) in resolved {
        accounts.entry(name.to_string()).or_default().insert(field.to_string(), value);
    }
    Ok(accounts)
}

fn account_parameters(accounts: &AccountTable) -> FunctionArgs {
    let mut parameters = FunctionArgs::new();
    parameters.insert("accounts".to_string(), json!(accounts));
    parameters
}

/// `account(name=..., field='id')`
fn account(args: &FunctionArgs) -> anyhow::Result<String> {
    let name = required_str(args, "name")?;
    let field = optional_str(args, "field").unwrap_or_else(|| "id".to_string());

    let Some(Value::Object(accounts)) = args.get("accounts") else {
        bail!("no accounts are available");
    };
    let Some(account) = accounts.get(&name) else {
        let known: Vec<&str> = accounts.keys().map(String::as_str).collect();
        bail!("unknown account '{}' (known: {})", name, known.join(", "));
    };
    match account.get(&field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Ok(other.to_string()),
        None => bail!("account '{name}' has no field '{field}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{EnvLookup, ResolutionMode};

    const MANIFEST: &str = r#"
environments: [dev, prod]
build-variables:
  region: eu-west-1
  prefix: "${ref:environment}-web"
accounts:
  main: { id: "123456789012", region: "${ref:region}" }
projects:
  data:
    account: main
    units:
      database:
        template: rds.yaml
        depends_on: [network]
        parameters:
          Name: "${ref:prefix}-db"
  web:
    account: main
    units:
      network:
        template: network.yaml
        parameters:
          Cidr: 10.0.0.0/16
          Region: "${func:account(name='main', field='region')}"
      app:
        depends_on: [network, database]
        parameters:
          Stage: { value: "${env:STAGE}", default_value: local }
          Account: "${func:account(name='main')}"
      seed:
        environments: [dev]
        depends_on: [database]
        parameters: {}
"#;

    fn context() -> ResolveContext {
        ResolveContext::default().with_env(EnvLookup::isolated())
    }

    async fn planner(environment: &str) -> Planner {
        let manifest = Manifest::from_yaml(MANIFEST, "test.yaml").unwrap();
        Planner::load(manifest, Some(environment), context()).await.unwrap()
    }

    #[test]
    fn test_select_environment() {
        let manifest = Manifest::from_yaml(MANIFEST, "test.yaml").unwrap();
        assert_eq!(select_environment(&manifest, Some("prod")).unwrap(), "prod");
        assert!(select_environment(&manifest, None).unwrap_err().to_string().contains("--env"));
        assert!(
            select_environment(&manifest, Some("prd")).unwrap_err().to_string().contains("Did you mean: prod?")
        );

        let bare = Manifest::from_yaml("projects: {}", "bare.yaml").unwrap();
        assert_eq!(select_environment(&bare, None).unwrap(), DEFAULT_SCOPE);
        assert!(select_environment(&bare, Some("dev")).is_err());

        let single = Manifest::from_yaml("environments: [qa]", "single.yaml").unwrap();
        assert_eq!(select_environment(&single, None).unwrap(), "qa");
    }

    #[tokio::test]
    async fn test_order_whole_environment() {
        let dev = planner("dev").await;
        assert_eq!(dev.order(None).unwrap(), vec!["network", "database", "app", "seed"]);

        let prod = planner("prod").await;
        assert_eq!(prod.order(None).unwrap(), vec!["network", "database", "app"]);
    }

    #[tokio::test]
    async fn test_whole_order_ignores_file_order() {
        let yaml = "projects:\n  zeta:\n    units:\n      z2: {}\n      z1: {}\n  alpha:\n    units:\n      a1: {}\n";
        let manifest = Manifest::from_yaml(yaml, "order.yaml").unwrap();
        let planner = Planner::load(manifest, None, context()).await.unwrap();
        assert_eq!(planner.order(None).unwrap(), vec!["a1", "z1", "z2"]);
    }

    #[tokio::test]
    async fn test_order_from_start_unit() {
        let dev = planner("dev").await;
        assert_eq!(dev.order(Some("seed")).unwrap(), vec!["network", "database", "seed"]);
        assert!(dev.order(Some("sede")).is_err());
    }

    #[tokio::test]
    async fn test_plan_resolves_parameters() {
        let plan = planner("prod").await.plan(None).await.unwrap();
        assert_eq!(plan.environment, "prod");

        let database = &plan.units[1];
        assert_eq!(database.name, "database");
        assert_eq!(database.project, "data");
        assert_eq!(database.parameters["Name"], "prod-web-db");
        assert_eq!(database.depends_on, vec!["network"]);

        let network = &plan.units[0];
        assert_eq!(network.parameters["Region"], "eu-west-1");
        assert_eq!(network.parameters["Cidr"], "10.0.0.0/16");

        let app = &plan.units[2];
        assert_eq!(app.parameters["Stage"], "local");
        assert_eq!(app.parameters["Account"], "123456789012");

        let account = app.account.as_ref().unwrap();
        assert_eq!(account.name, "main");
        assert_eq!(account.fields["region"], "eu-west-1");
    }

    #[tokio::test]
    async fn test_environment_override_from_env() {
        let manifest = Manifest::from_yaml(MANIFEST, "test.yaml").unwrap();
        let context = ResolveContext::default().with_env(EnvLookup::isolated().with_var("STAGE", "blue"));
        let planner = Planner::load(manifest, Some("dev"), context).await.unwrap();
        assert_eq!(planner.resolve_parameters("app").await.unwrap()["Stage"], "blue");
    }

    #[tokio::test]
    async fn test_plan_serializes_to_json() {
        let plan = planner("dev").await.plan(Some("network")).await.unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["units"][0]["name"], "network");
        assert_eq!(json["units"][0]["account"]["id"], "123456789012");
        assert!(json["units"][0].get("depends_on").is_none());
    }

    #[tokio::test]
    async fn test_validate_clean_manifest() {
        let report = planner("dev").await.validate();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[tokio::test]
    async fn test_validate_reports_problems() {
        let yaml = r#"
environments: [dev]
projects:
  p:
    units:
      a:
        depends_on: [b]
        parameters:
          Name: "${func:jion(items=['x'])}"
          Missing: "${ref:nowhere}"
          Odd: "${func:join(1 + 2)}"
      b:
        depends_on: [a]
        parameters:
          Tag: "${bogus:value}"
"#;
        let manifest = Manifest::from_yaml(yaml, "bad.yaml").unwrap();
        let report = Planner::load(manifest, None, context()).await.unwrap().validate();

        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
        assert!(report.errors.iter().any(|e| e.contains("'jion'") && e.contains("join")));
        assert!(report.errors.iter().any(|e| e.contains("nowhere")));
        assert!(report.errors.iter().any(|e| e.contains("bogus")));
        assert!(report.warnings.iter().any(|w| w.contains("a, b")));
        assert!(report.warnings.iter().any(|w| w.contains("join(1 + 2)")));
    }

    #[tokio::test]
    async fn test_validate_warns_about_out_of_scope_dependency() {
        let yaml = r"
projects:
  p:
    units:
      seed: { environments: [dev] }
      app: { environments: [dev, prod], depends_on: [seed] }
";
        let manifest = Manifest::from_yaml(yaml, "m.yaml").unwrap();
        let report = Planner::load(manifest, Some("prod"), context()).await.unwrap().validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings, vec!["Unit 'app' depends on 'seed', which is not part of 'prod'"]);
    }

    #[tokio::test]
    async fn test_strict_mode_propagates_function_failure() {
        let yaml = r#"
projects:
  p:
    units:
      a:
        parameters:
          Id: "${func:account(name='ghost')}"
"#;
        let lenient = Planner::load(Manifest::from_yaml(yaml, "m.yaml").unwrap(), None, context())
            .await
            .unwrap();
        assert_eq!(lenient.resolve_parameters("a").await.unwrap()["Id"], "");

        let strict = Planner::load(
            Manifest::from_yaml(yaml, "m.yaml").unwrap(),
            None,
            context().with_mode(ResolutionMode::Strict),
        )
        .await
        .unwrap();
        let err = strict.plan(None).await.unwrap_err();
        assert!(format!("{err:#}").contains("unknown account 'ghost'"));
    }

    #[tokio::test]
    async fn test_declared_environment_variable_wins() {
        let yaml = "environments: [dev]\nbuild-variables:\n  environment: staging\nprojects:\n  p:\n    units:\n      a:\n        parameters:\n          Env: '${ref:environment}'\n";
        let planner = Planner::load(Manifest::from_yaml(yaml, "m.yaml").unwrap(), None, context())
            .await
            .unwrap();
        assert_eq!(planner.resolve_parameters("a").await.unwrap()["Env"], "staging");
    }
}
