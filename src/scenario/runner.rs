//! A fully resolved scenario and its preparation onto disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::{self, ActivityEvent};
use crate::project::{Project, TempOptions};
use crate::scenario::app::{PreparedApp, Shell};
use crate::scenario::tree::{Mutator, ProjectFactory};

/// Name given to the scenario of a tree that was never expanded.
pub const ROOT_SCENARIO_NAME: &str = "<root>";

/// How [`Scenario::prepare_with`] places and equips the result.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Write here instead of wherever the project would go on its own.
    pub outdir: Option<PathBuf>,
    /// Temp-dir settings for projects without a base directory.
    pub temp: Option<TempOptions>,
    /// Shell handed to the resulting [`PreparedApp`].
    pub shell: Option<Shell>,
}

impl PrepareOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            outdir: None,
            temp: Some(TempOptions {
                prefix: config.prepare.temp_prefix.clone(),
                keep: config.prepare.keep_temp_dirs,
            }),
            shell: Some(Shell::from_config(&config.execute)),
        }
    }

    #[must_use]
    pub fn outdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outdir = Some(dir.into());
        self
    }
}

/// A named base-project factory plus the ordered mutators that turn it into
/// this variant. Cheap to clone.
#[derive(Clone)]
pub struct Scenario {
    name: String,
    factory: ProjectFactory,
    steps: Vec<Mutator>,
}

impl Scenario {
    pub(crate) fn new(name: String, factory: ProjectFactory, steps: Vec<Mutator>) -> Self {
        Self {
            name,
            factory,
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Run the factory, then every mutator in order, without writing.
    pub fn build_project(&self) -> Result<Project> {
        let mut project = (self.factory)()?;
        for step in &self.steps {
            step(&mut project)?;
        }
        Ok(project)
    }

    /// Build the project and write it to `outdir` (or the project's own
    /// default, usually a fresh temporary directory).
    ///
    /// Failures from the factory, a mutator or the write are returned as-is;
    /// anything already written stays on disk.
    ///
    /// An auto-allocated temporary directory lives only as long as the
    /// returned [`PreparedApp`] (and its clones). It is removed when the last
    /// handle drops, not at process exit, so keep the app around while the
    /// directory is in use: `scenario.prepare(None)?.dir().to_path_buf()`
    /// names a directory that is already gone. Pass an `outdir`, or use
    /// [`TempOptions::keep`] (`keep_temp_dirs` in config), to keep the files.
    pub fn prepare(&self, outdir: Option<&Path>) -> Result<PreparedApp> {
        self.prepare_with(&PrepareOptions {
            outdir: outdir.map(Path::to_path_buf),
            ..PrepareOptions::default()
        })
    }

    pub fn prepare_with(&self, options: &PrepareOptions) -> Result<PreparedApp> {
        let started = Instant::now();
        let result = self.materialize(options);
        match &result {
            Ok(app) => logger::emit(ActivityEvent::ScenarioPrepared {
                scenario: self.name.clone(),
                dir: app.dir().display().to_string(),
                steps: self.steps.len(),
                duration: started.elapsed(),
            }),
            Err(err) => logger::emit(ActivityEvent::PrepareFailed {
                scenario: self.name.clone(),
                error_code: err.code().to_string(),
                error_message: err.to_string(),
            }),
        }
        result
    }

    fn materialize(&self, options: &PrepareOptions) -> Result<PreparedApp> {
        let mut project = self.build_project()?;
        if let Some(dir) = &options.outdir {
            project.set_base_dir(dir);
        } else if project.base_dir().is_none() {
            if let Some(temp) = &options.temp {
                project.set_temp_options(temp.clone());
            }
        }

        let dir = project.write()?;
        let mut app = PreparedApp::new(dir).with_guard(project.temp_guard());
        if let Some(shell) = &options.shell {
            app = app.with_shell(shell.clone());
        }
        Ok(app)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}
