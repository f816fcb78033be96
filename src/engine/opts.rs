use crate::{
    dsp::wsola::WsolaConfig,
    foundation::error::{OpflowError, OpflowResult},
    foundation::pool::PoolOpts,
};

/// Engine-wide tuning knobs. Every field has a default, so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    /// Limits of the shared snapshot pool.
    pub pool: PoolOpts,
    /// Fan property sampling out over rayon when inspecting a chain.
    pub parallel_sampling: bool,
    /// Minimum number of properties before sampling goes parallel.
    pub parallel_threshold: usize,
    /// Optional explicit worker count for the sampling pool.
    pub threads: Option<usize>,
    /// Forward jumps larger than this count as a seek for stateful nodes.
    pub seek_tolerance_ms: f64,
    /// Defaults for time-stretch processors created by graph nodes.
    pub wsola: WsolaConfig,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            pool: PoolOpts::default(),
            parallel_sampling: false,
            parallel_threshold: 64,
            threads: None,
            seek_tolerance_ms: 250.0,
            wsola: WsolaConfig::default(),
        }
    }
}

impl EngineOpts {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> OpflowResult<Self> {
        let opts: Self = serde_json::from_str(s)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> OpflowResult<()> {
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(OpflowError::validation(
                "engine 'threads' must be >= 1 when set",
            ));
        }
        if !self.seek_tolerance_ms.is_finite() || self.seek_tolerance_ms < 0.0 {
            return Err(OpflowError::validation(
                "engine 'seek_tolerance_ms' must be finite and >= 0",
            ));
        }
        self.wsola.validate()
    }

    /// Dedicated rayon pool for parallel sampling, if parallel sampling is enabled.
    pub(crate) fn build_thread_pool(&self) -> OpflowResult<Option<rayon::ThreadPool>> {
        if !self.parallel_sampling {
            return Ok(None);
        }
        self.validate()?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.threads {
            builder = builder.num_threads(n);
        }
        builder
            .build()
            .map(Some)
            .map_err(|e| OpflowError::evaluation(format!("failed to build rayon thread pool: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/opts.rs"]
mod tests;
