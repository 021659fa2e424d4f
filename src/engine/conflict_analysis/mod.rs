mod resolution;

pub(crate) use resolution::ConflictAnalysisResult;
pub(crate) use resolution::ResolutionConflictAnalyser;
