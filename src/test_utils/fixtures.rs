//! Sample manifests.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A manifest document plus the file name it is written under.
#[derive(Clone, Debug)]
pub struct ManifestFixture {
    pub name: String,
    pub content: String,
}

impl ManifestFixture {
    /// Two projects, two environments, an account and every snippet kind except
    /// `shell`.
    ///
    /// Deployment order for `dev` is `network, database, app, seed`; `seed` is not
    /// part of `prod`.
    pub fn web_stack() -> Self {
        Self {
            name: "stack.yaml".to_string(),
            content: r#"
environments: [dev, prod]
build-variables:
  region: eu-west-1
  prefix: "${ref:environment}-web"
exports:
  vpc_id: vpc-0abc
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
          Vpc: "${exports:vpc_id}"
  web:
    account: main
    units:
      network:
        template: network.yaml
        parameters:
          Cidr: 10.0.0.0/16
          Region: "${func:account(name='main', field='region')}"
      app:
        template: app.yaml
        depends_on: [network, database]
        parameters:
          Stage: { value: "${env:STACKYARD_TEST_STAGE}", default_value: local }
          Name: "${func:join(items=['${ref:prefix}', 'app'], separator='-')}"
          Replicas: { value: 2, type: int }
      seed:
        environments: [dev]
        depends_on: [database]
        parameters: {}
"#
            .trim_start()
            .to_string(),
        }
    }

    /// Units without environments, linked in a cycle.
    pub fn cyclic() -> Self {
        Self {
            name: "cyclic.yaml".to_string(),
            content: r"
projects:
  core:
    units:
      a: { depends_on: [b] }
      b: { depends_on: [a] }
"
            .trim_start()
            .to_string(),
        }
    }

    /// References that do not exist.
    pub fn broken_references() -> Self {
        Self {
            name: "broken.yaml".to_string(),
            content: r#"
projects:
  core:
    units:
      app:
        parameters:
          Name: "${func:jion(items=['a'])}"
          Bucket: "${ref:bucket}"
"#
            .trim_start()
            .to_string(),
        }
    }

    /// Write the manifest into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.name);
        fs::write(&path, &self.content)
            .with_context(|| format!("Failed to write fixture {}", path.display()))?;
        Ok(path)
    }
}
