//! Parsing many texts against one language in parallel.

use crate::parser::{ParseError, Parser};
use crate::tree::SyntaxTree;
use rayon::prelude::*;

impl Parser {
    /// Parse every text on the rayon pool. Results keep the input order.
    pub fn parse_batch<S>(&self, texts: &[S]) -> Vec<Result<SyntaxTree, ParseError>>
    where
        S: AsRef<str> + Sync,
    {
        let results: Vec<_> = texts.par_iter().map(|text| self.parse(text.as_ref())).collect();
        let failed = results.iter().filter(|result| result.is_err()).count();
        tracing::debug!(texts = texts.len(), failed, "parsed batch");
        results
    }
}

#[cfg(test)]
mod tests {
    use crate::languages::mufiz;
    use crate::parser::Parser;

    #[test]
    fn test_batch_matches_sequential_parses() {
        let parser = Parser::new(mufiz());
        let texts: Vec<String> = (0..32)
            .map(|i| if i % 5 == 0 { format!("var x{i} = ;") } else { format!("var x{i} = {i};") })
            .collect();

        let batch = parser.parse_batch(&texts);
        assert_eq!(batch.len(), texts.len());
        for (text, result) in texts.iter().zip(&batch) {
            let tree = result.as_ref().unwrap();
            assert_eq!(tree.text(), text);
            assert_eq!(tree.root(), parser.parse(text).unwrap().root());
        }
        assert!(batch[0].as_ref().unwrap().has_error());
        assert!(!batch[1].as_ref().unwrap().has_error());
    }
}
