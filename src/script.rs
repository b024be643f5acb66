//! Line-oriented command scripts.
//!
//! A script is plain text. The first non-blank line holds the order, every
//! following non-blank line holds one command:
//!
//! ```text
//! 4
//! Insert(0.02,Value98)
//! Search(3.55)
//! Search(-3.91,30.96)
//! ```
//!
//! Each `Search` writes exactly one output line: `Null` when nothing matched,
//! the values joined with `", "` for a point search, or one `(key,value)` pair
//! per value joined with `", "` for a range search.

use crate::btree::{format_key, BPlusTree};
use crate::error::{Result, TreeError};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::{debug, info};

/// Output line for a search with no match
pub const NOT_FOUND: &str = "Null";

/// One parsed script command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `Insert(key,value)`
    Insert { key: f64, value: String },
    /// `Search(key)`
    Search { key: f64 },
    /// `Search(key1,key2)`
    SearchRange { from: f64, to: f64 },
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = s
            .split_once('(')
            .ok_or_else(|| format!("expected `Operation(arguments)`, got `{s}`"))?;
        let args = rest
            .trim_end()
            .strip_suffix(')')
            .ok_or_else(|| format!("missing closing parenthesis in `{s}`"))?;

        match name.trim() {
            "Insert" => {
                let (key, value) = args
                    .split_once(',')
                    .ok_or_else(|| format!("Insert needs a key and a value, got `{args}`"))?;
                let value = value.trim();
                if value.is_empty() {
                    return Err(format!("Insert has an empty value in `{s}`"));
                }
                Ok(Command::Insert {
                    key: parse_key(key)?,
                    value: value.to_string(),
                })
            }
            "Search" => match args.split_once(',') {
                None => Ok(Command::Search {
                    key: parse_key(args)?,
                }),
                Some((from, to)) => Ok(Command::SearchRange {
                    from: parse_key(from)?,
                    to: parse_key(to)?,
                }),
            },
            other => Err(format!("unknown operation `{other}`")),
        }
    }
}

fn parse_key(text: &str) -> std::result::Result<f64, String> {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(key) if !key.is_nan() => Ok(key),
        _ => Err(format!("invalid key `{text}`")),
    }
}

impl Command {
    /// Run the command against `tree`, writing a result line for searches
    pub fn apply<W: Write>(&self, tree: &mut BPlusTree, out: &mut W) -> Result<()> {
        match self {
            Command::Insert { key, value } => tree.insert(*key, value.as_str()),
            Command::Search { key } => {
                writeln!(out, "{}", format_values(tree.lookup(*key)?))?;
                Ok(())
            }
            Command::SearchRange { from, to } => {
                writeln!(out, "{}", format_range(&tree.range_lookup(*from, *to)?))?;
                Ok(())
            }
        }
    }
}

/// Format a point search result
pub fn format_values<V: AsRef<str>>(values: Option<&[V]>) -> String {
    match values {
        None => NOT_FOUND.to_string(),
        Some(values) => values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Format a range search result, one `(key,value)` pair per value
pub fn format_range<V: AsRef<[String]>>(items: &[(f64, V)]) -> String {
    if items.is_empty() {
        return NOT_FOUND.to_string();
    }
    items
        .iter()
        .flat_map(|(key, values)| {
            let key = format_key(*key);
            values
                .as_ref()
                .iter()
                .map(move |value| format!("({key},{value})"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Counts of what a script did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub order: usize,
    pub inserts: usize,
    pub searches: usize,
    pub range_searches: usize,
}

/// Execute a script, writing one line per search to `output`
///
/// Returns the resulting tree along with a summary. Fails on the first
/// malformed line, reporting its 1-based line number.
pub fn run_script<R: BufRead, W: Write>(
    input: R,
    mut output: W,
) -> Result<(BPlusTree, ScriptSummary)> {
    let mut lines = input.lines().enumerate();

    let order = loop {
        let Some((idx, line)) = lines.next() else {
            return Err(TreeError::MissingOrder);
        };
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        break text
            .parse::<usize>()
            .map_err(|_| TreeError::invalid_command(idx + 1, format!("invalid order `{text}`")))?;
    };

    let mut tree = BPlusTree::new(order)?;
    let mut summary = ScriptSummary {
        order,
        ..ScriptSummary::default()
    };

    for (idx, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command: Command = line
            .parse()
            .map_err(|reason| TreeError::invalid_command(idx + 1, reason))?;
        debug!(line = idx + 1, ?command, "executing");

        match command {
            Command::Insert { .. } => summary.inserts += 1,
            Command::Search { .. } => summary.searches += 1,
            Command::SearchRange { .. } => summary.range_searches += 1,
        }
        command.apply(&mut tree, &mut output)?;
    }
    output.flush()?;

    info!(
        order,
        inserts = summary.inserts,
        searches = summary.searches,
        range_searches = summary.range_searches,
        height = tree.height(),
        "script complete"
    );
    Ok((tree, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(script: &str) -> Result<(String, ScriptSummary)> {
        let mut out = Vec::new();
        let (_, summary) = run_script(Cursor::new(script), &mut out)?;
        Ok((String::from_utf8_lossy(&out).into_owned(), summary))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "Insert(0.02,Value98)".parse::<Command>(),
            Ok(Command::Insert {
                key: 0.02,
                value: "Value98".to_string()
            })
        );
        assert_eq!(
            "  Search( 3.55 ) ".parse::<Command>(),
            Ok(Command::Search { key: 3.55 })
        );
        assert_eq!(
            "Search(-3.91,30.96)".parse::<Command>(),
            Ok(Command::SearchRange {
                from: -3.91,
                to: 30.96
            })
        );
    }

    #[test]
    fn test_insert_value_keeps_text_after_first_comma() {
        assert_eq!(
            "Insert(1,a,b)".parse::<Command>(),
            Ok(Command::Insert {
                key: 1.0,
                value: "a,b".to_string()
            })
        );
        assert_eq!(
            "Insert(1, a )".parse::<Command>(),
            Ok(Command::Insert {
                key: 1.0,
                value: "a".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "Delete(1)",
            "Insert(1)",
            "Insert(1,)",
            "Insert(abc,v)",
            "Search(1",
            "Search()",
            "Search(1,2,3)",
            "Search(NaN)",
            "Search",
        ] {
            assert!(bad.parse::<Command>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_format_values() {
        assert_eq!(format_values::<String>(None), "Null");
        let values = vec!["A".to_string(), "B".to_string()];
        assert_eq!(format_values(Some(values.as_slice())), "A, B");
    }

    #[test]
    fn test_format_range_expands_values() {
        let items = vec![
            (1.0, vec!["a".to_string(), "b".to_string()]),
            (2.5, vec!["c".to_string()]),
        ];
        assert_eq!(format_range(&items), "(1.0,a), (1.0,b), (2.5,c)");
        let empty: Vec<(f64, Vec<String>)> = Vec::new();
        assert_eq!(format_range(&empty), "Null");
    }

    #[test]
    fn test_run_script() -> Result<()> {
        let script = "4\n\
            Insert(0.02,Value98)\n\
            Insert(3.55,A)\n\
            Insert(-3.91,B)\n\
            Insert(30.96,C)\n\
            Insert(10,D)\n\
            Search(3.55)\n\
            Search(-3.91,30.96)\n\
            Search(999)\n\
            \n\
            Insert(3.55,A2)\n\
            Search(3.55)\n\
            Search(100,200)\n";
        let (out, summary) = run(script)?;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "A",
                "(-3.91,B), (0.02,Value98), (3.55,A), (10.0,D), (30.96,C)",
                "Null",
                "A, A2",
                "Null",
            ]
        );
        assert_eq!(
            summary,
            ScriptSummary {
                order: 4,
                inserts: 6,
                searches: 3,
                range_searches: 2
            }
        );
        Ok(())
    }

    #[test]
    fn test_range_prints_extreme_keys_in_scientific_form() -> Result<()> {
        let script = "3\n\
            Insert(12345678,big)\n\
            Insert(0.00001,tiny)\n\
            Insert(42,mid)\n\
            Search(0,1e8)\n";
        let (out, _) = run(script)?;
        assert_eq!(out, "(1.0E-5,tiny), (42.0,mid), (1.2345678E7,big)\n");
        Ok(())
    }

    #[test]
    fn test_run_script_skips_leading_blank_lines() -> Result<()> {
        let (out, summary) = run("\n  \n3\nInsert(1,a)\nSearch(1)\n")?;
        assert_eq!(out, "a\n");
        assert_eq!(summary.order, 3);
        Ok(())
    }

    #[test]
    fn test_run_script_errors() {
        assert!(matches!(run(""), Err(TreeError::MissingOrder)));
        assert!(matches!(run("\n\n"), Err(TreeError::MissingOrder)));
        assert!(matches!(
            run("four\n"),
            Err(TreeError::InvalidCommand { line: 1, .. })
        ));
        assert!(matches!(
            run("2\nInsert(1,a)\n"),
            Err(TreeError::InvalidOrder { order: 2, .. })
        ));
        assert!(matches!(
            run("3\nInsert(1,a)\nFind(1)\n"),
            Err(TreeError::InvalidCommand { line: 3, .. })
        ));
    }
}
