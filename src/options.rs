//! Knobs for policies the language definition leaves open.

/// Settings for one compilation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
  /// Give every switch case group its own scope during name resolution.
  /// Off by default: declarations inside a group belong to the enclosing scope.
  pub scoped_switch_groups: bool,
  /// Annotate the assembly with `# PUSH`/`# POP` and frame comments.
  pub annotate: bool,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      scoped_switch_groups: false,
      annotate: true,
    }
  }
}

impl Options {
  pub fn with_scoped_switch_groups(mut self, enabled: bool) -> Self {
    self.scoped_switch_groups = enabled;
    self
  }

  pub fn with_annotations(mut self, enabled: bool) -> Self {
    self.annotate = enabled;
    self
  }
}
