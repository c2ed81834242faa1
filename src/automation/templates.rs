//! Ready-made workflows for common chores.

use std::collections::BTreeMap;
use std::path::Path;

use super::builder::{AutomationBuilder, BuilderError};
use super::task::{AutomationTask, WorkflowCondition};
use crate::data::{ColumnSchema, DataConfig, RuleAction, Transformation, ValidationRule};

type Built = Result<AutomationTask, BuilderError>;

fn command(program: &str, args: &[&str]) -> Built {
    AutomationBuilder::process().run_command(program, args.iter().copied()).build()
}

/// Platform command that opens `target` with the default handler.
fn opener(target: &str) -> Built {
    if cfg!(windows) {
        command("cmd", &["/C", "start", "", target])
    } else if cfg!(target_os = "macos") {
        command("open", &[target])
    } else {
        command("xdg-open", &[target])
    }
}

pub struct WorkflowTemplates;

impl WorkflowTemplates {
    /// Open `url`, fill username and password, press the Login button.
    pub fn web_login(url: &str, username: &str, password: &str) -> Built {
        AutomationBuilder::workflow()
            .add_step(opener(url)?)
            .add_step(AutomationBuilder::ui().type_text(username).build()?)
            .add_step(AutomationBuilder::ui().press_keys(["Tab"]).build()?)
            .add_step(AutomationBuilder::ui().type_text(password).build()?)
            .add_step(AutomationBuilder::ui().click_text("Login", false).build()?)
            .run_sequential()
            .with_timeout(30.0)
            .with_retries(3)
            .build()
    }

    /// Mirror `source_dir` into `backup_dir`, then zip the backup.
    pub fn file_backup(source_dir: &Path, backup_dir: &Path) -> Built {
        let backup = backup_dir.to_string_lossy();
        let archive = format!("{backup}.zip");
        AutomationBuilder::workflow()
            .add_step(
                AutomationBuilder::data()
                    .sync_folders(source_dir, backup_dir, Vec::new())
                    .build()?,
            )
            .add_step(command("zip", &["-r", archive.as_str(), &*backup])?)
            .run_sequential()
            .with_timeout(300.0)
            .build()
    }

    /// Fetch JSON records from `url`, drop empty and duplicate rows, sort by
    /// `sort_key` and save them to `output_file`.
    pub fn web_scrape_table(url: &str, sort_key: &str, output_file: &Path) -> Built {
        let config = DataConfig {
            validation_rules: vec![ValidationRule::Missing {
                columns: Some(vec![sort_key.to_string()]),
                action: RuleAction::Drop,
                fill_value: serde_json::Value::Null,
            }],
            transformations: vec![
                Transformation::Dedupe { fields: None },
                Transformation::Sort {
                    by: sort_key.to_string(),
                    descending: false,
                },
            ],
            ..DataConfig::default()
        };
        AutomationBuilder::workflow()
            .add_step(AutomationBuilder::data().transform(url, output_file, config).build()?)
            .run_sequential()
            .with_timeout(60.0)
            .build()
    }

    /// Sample `process_name`; `alert` runs only when its CPU usage is above
    /// `cpu_threshold` percent.
    pub fn system_monitor(process_name: &str, cpu_threshold: f64, alert: AutomationTask) -> Built {
        AutomationBuilder::workflow()
            .add_step(AutomationBuilder::process().monitor_process(process_name).build()?)
            .add_step(alert)
            .run_conditional(WorkflowCondition::FieldGreaterThan {
                field: "cpu_usage".to_string(),
                threshold: cpu_threshold,
            })
            .with_timeout(3600.0)
            .build()
    }

    /// checkout, pull, add, commit, push on `branch` of the repository at `repo_path`.
    pub fn git_workflow(repo_path: &Path, branch: &str, commit_msg: &str) -> Built {
        fn git(repo: &str, args: &[&str]) -> Built {
            let mut full = vec!["-C", repo];
            full.extend_from_slice(args);
            command("git", &full)
        }

        let repo = repo_path.to_string_lossy();
        AutomationBuilder::workflow()
            .add_step(git(&repo, &["checkout", branch])?)
            .add_step(git(&repo, &["pull", "origin", branch])?)
            .add_step(git(&repo, &["add", "."])?)
            .add_step(git(&repo, &["commit", "-m", commit_msg])?)
            .add_step(git(&repo, &["push", "origin", branch])?)
            .run_sequential()
            .with_timeout(120.0)
            .with_retries(3)
            .build()
    }

    /// Check `input_file` against `schema`, then write the rows without
    /// missing values or duplicates to `output_file`.
    pub fn data_validation(input_file: &Path, schema: BTreeMap<String, ColumnSchema>, output_file: &Path) -> Built {
        let input = input_file.to_string_lossy().into_owned();
        let validate = DataConfig {
            schema: Some(schema),
            ..DataConfig::default()
        };
        let clean = DataConfig {
            validation_rules: vec![
                ValidationRule::Missing {
                    columns: None,
                    action: RuleAction::Drop,
                    fill_value: serde_json::Value::Null,
                },
                ValidationRule::Duplicate { columns: None },
            ],
            ..DataConfig::default()
        };
        AutomationBuilder::workflow()
            .add_step(AutomationBuilder::data().validate(input.clone(), validate).build()?)
            .add_step(AutomationBuilder::data().transform(input, output_file, clean).build()?)
            .run_sequential()
            .with_timeout(60.0)
            .build()
    }

    /// For every `(label, value)`: click the label, type the value, Tab.
    pub fn web_form_fill(fields: &[(String, String)]) -> Built {
        let mut workflow = AutomationBuilder::workflow();
        for (label, value) in fields {
            workflow = workflow
                .add_step(AutomationBuilder::ui().click_text(label.as_str(), true).build()?)
                .add_step(AutomationBuilder::ui().type_text(value.as_str()).build()?)
                .add_step(AutomationBuilder::ui().press_keys(["Tab"]).build()?);
        }
        workflow.run_sequential().with_timeout(120.0).build()
    }

    /// Wait for `path` to change so that it contains `pattern`, then run `handler`.
    pub fn file_monitor(path: &Path, pattern: &str, handler: AutomationTask) -> Built {
        AutomationBuilder::workflow()
            .add_step(AutomationBuilder::data().monitor_file(path, pattern, 3600.0).build()?)
            .add_step(handler)
            .run_conditional(WorkflowCondition::FieldTrue {
                field: "pattern_matched".to_string(),
            })
            .with_timeout(3600.0)
            .build()
    }

    pub fn system_maintenance() -> Built {
        let steps = if cfg!(windows) {
            vec![
                command("cleanmgr", &["/sagerun:1"])?,
                command("defrag", &["C:", "/U", "/V"])?,
                command("chkdsk", &["C:", "/F"])?,
            ]
        } else {
            vec![
                command("sync", &[])?,
                command("df", &["-h"])?,
                command("find", &["/tmp", "-type", "f", "-atime", "+7", "-delete"])?,
            ]
        };
        steps
            .into_iter()
            .fold(AutomationBuilder::workflow(), |w, s| w.add_step(s))
            .run_sequential()
            .with_timeout(7200.0)
            .build()
    }

    /// Stop `app_name`, run the installer for `version` and start it again.
    pub fn app_update(app_name: &str, version: &str) -> Built {
        let steps = if cfg!(windows) {
            let exe = format!("{app_name}.exe");
            let msi = format!("{app_name}-{version}.msi");
            vec![
                command("taskkill", &["/IM", exe.as_str(), "/F"])?,
                command("msiexec", &["/i", msi.as_str(), "/quiet"])?,
                command(&exe, &[])?,
            ]
        } else {
            let installer = format!("./{app_name}-{version}.sh");
            vec![
                command("pkill", &["-x", app_name])?,
                command("sh", &[installer.as_str()])?,
                command(app_name, &[])?,
            ]
        };
        steps
            .into_iter()
            .fold(AutomationBuilder::workflow(), |w, s| w.add_step(s))
            .run_sequential()
            .with_timeout(300.0)
            .with_retries(2)
            .build()
    }
}
