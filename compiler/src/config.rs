/// Knobs for analysis, emission and loading
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Log the printed target code of every unit at `trace` level
    pub trace_emitted: bool,
    /// How many expansions a single form may go through
    pub max_macro_depth: usize,
    /// File recorded in positions of forms read by `eval_string`
    pub file_name: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            trace_emitted: false,
            max_macro_depth: 256,
            file_name: None,
        }
    }
}

impl CompilerOptions {
    pub fn with_trace_emitted(mut self, trace: bool) -> Self {
        self.trace_emitted = trace;
        self
    }

    pub fn with_max_macro_depth(mut self, depth: usize) -> Self {
        self.max_macro_depth = depth;
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}
