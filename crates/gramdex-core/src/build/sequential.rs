use super::{file_id, BuildContext, BuildStrategy};
use crate::error::Result;
use crate::index::InvertedIndex;
use std::path::PathBuf;
use tracing::instrument;

/// Indexes files one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl BuildStrategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    #[instrument(skip_all, fields(files = files.len()))]
    fn build(&self, files: &[PathBuf], ctx: &BuildContext) -> Result<InvertedIndex> {
        let mut index = InvertedIndex::new();
        for (i, path) in files.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            index.merge(ctx.index_file(file_id(i), path));
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::AcceptAll;
    use crate::test_support::MemoryReader;
    use std::sync::Arc;

    #[test]
    fn test_sequential_build() {
        let reader = MemoryReader::new()
            .with_file("a", &["hello"])
            .with_file("b", &["yellow"]);
        let ctx = BuildContext::new(3, "\n", Arc::new(AcceptAll), Arc::new(reader)).unwrap();
        let files = vec![PathBuf::from("a"), PathBuf::from("b")];

        let index = Sequential.build(&files, &ctx).unwrap();
        let ell = ctx.interner().get("ell").unwrap();
        let low = ctx.interner().get("low").unwrap();
        assert_eq!(index.get(&ell).unwrap().iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(index.get(&low).unwrap().iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_sequential_stops_when_cancelled() {
        let reader = MemoryReader::new().with_file("a", &["hello"]);
        let ctx = BuildContext::new(3, "\n", Arc::new(AcceptAll), Arc::new(reader)).unwrap();
        ctx.cancellation().cancel();

        let index = Sequential.build(&[PathBuf::from("a")], &ctx).unwrap();
        assert!(index.is_empty());
    }
}
