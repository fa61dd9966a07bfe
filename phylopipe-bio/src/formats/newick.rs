//! Newick tree parsing
//!
//! Supports unquoted and single-quoted labels, branch lengths, internal
//! node labels and bracketed comments. Internal labels are read as branch
//! support; for combined labels such as `80.2/95` (SH-aLRT/UFBoot) the last
//! component is used.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_until, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, preceded, terminated},
    IResult,
};
use phylopipe_core::{PhyloError, PhyloResult, TreeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct NewickNode {
    pub label: Option<String>,
    pub length: Option<f64>,
    pub children: Vec<NewickNode>,
}

impl NewickNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Leaf labels in left-to-right order; unnamed leaves yield `None`
    pub fn leaf_labels(&self) -> Vec<Option<&str>> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<Option<&'a str>>) {
        if self.is_leaf() {
            out.push(self.label.as_deref());
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    /// Labels of internal nodes below the root, preorder
    pub fn internal_labels(&self) -> Vec<Option<&str>> {
        let mut out = Vec::new();
        for child in &self.children {
            child.collect_internal(&mut out);
        }
        out
    }

    fn collect_internal<'a>(&'a self, out: &mut Vec<Option<&'a str>>) {
        if self.is_leaf() {
            return;
        }
        out.push(self.label.as_deref());
        for child in &self.children {
            child.collect_internal(out);
        }
    }
}

/// Skip whitespace and `[...]` comments
fn ws(input: &str) -> IResult<&str, ()> {
    let (input, _) = multispace0(input)?;
    let (input, _) = many0(terminated(
        delimited(char('['), take_until("]"), char(']')),
        multispace0,
    ))(input)?;
    Ok((input, ()))
}

fn quoted_label(input: &str) -> IResult<&str, String> {
    let (mut input, _) = char('\'')(input)?;
    let mut out = String::new();
    loop {
        let (rest, chunk) = opt(is_not("'"))(input)?;
        out.push_str(chunk.unwrap_or_default());
        let (rest, _) = char('\'')(rest)?;
        // '' inside quotes is an escaped quote
        match char::<_, nom::error::Error<&str>>('\'')(rest) {
            Ok((rest, _)) => {
                out.push('\'');
                input = rest;
            }
            Err(_) => return Ok((rest, out)),
        }
    }
}

fn unquoted_label(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !"(),:;[]'".contains(c) && !c.is_whitespace()),
        |s: &str| s.to_string(),
    )(input)
}

fn label(input: &str) -> IResult<&str, String> {
    alt((quoted_label, unquoted_label))(input)
}

fn branch_length(input: &str) -> IResult<&str, f64> {
    preceded(terminated(char(':'), ws), double)(input)
}

fn children(input: &str) -> IResult<&str, Vec<NewickNode>> {
    delimited(
        terminated(char('('), ws),
        separated_list1(terminated(char(','), ws), subtree),
        terminated(char(')'), ws),
    )(input)
}

fn subtree(input: &str) -> IResult<&str, NewickNode> {
    let (input, children) = opt(children)(input)?;
    let (input, label) = opt(terminated(label, ws))(input)?;
    let (input, length) = opt(terminated(branch_length, ws))(input)?;
    Ok((
        input,
        NewickNode {
            label,
            length,
            children: children.unwrap_or_default(),
        },
    ))
}

fn tree(input: &str) -> IResult<&str, NewickNode> {
    all_consuming(delimited(ws, subtree, terminated(char(';'), ws)))(input)
}

/// Parse a single Newick tree terminated by `;`
pub fn parse_newick(text: &str) -> PhyloResult<NewickNode> {
    tree(text)
        .map(|(_, node)| node)
        .map_err(|e| PhyloError::parse(format!("malformed Newick tree: {}", e)))
}

/// Read a support value from an internal node label
pub fn support_value(label: &str) -> Option<f64> {
    label.rsplit('/').next()?.trim().parse::<f64>().ok()
}

/// Parse tool output into a [`TreeResult`]; leaf-count and support checks
/// are left to [`TreeResult::validate`].
pub fn tree_from_newick(text: &str, bootstrap_replicates: u32) -> PhyloResult<TreeResult> {
    let root = parse_newick(text)?;

    let leaves = root
        .leaf_labels()
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            label
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PhyloError::parse(format!("leaf {} of the tree has no name", index)))
        })
        .collect::<PhyloResult<Vec<_>>>()?;

    let supports = root
        .internal_labels()
        .into_iter()
        .map(|label| label.and_then(support_value))
        .collect();

    Ok(TreeResult {
        newick: text.trim().to_string(),
        leaves,
        supports,
        bootstrap_replicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_two_leaf_tree() {
        let root = parse_newick("(query:0.1,hit_1:0.2);").unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.leaf_labels(), vec![Some("query"), Some("hit_1")]);
        assert_eq!(root.children[1].length, Some(0.2));
        assert!(root.internal_labels().is_empty());
    }

    #[test]
    fn test_internal_supports() {
        let text = "((a:0.1,b:0.2)100:0.05,(c:0.3,d:0.4)87:0.01,e:0.5);\n";
        let tree = tree_from_newick(text, 100).unwrap();
        assert_eq!(tree.leaves, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(tree.supports, vec![Some(100.0), Some(87.0)]);
        assert!(tree.validate(5).is_ok());
    }

    #[test]
    fn test_combined_support_label_uses_last_part() {
        let tree = tree_from_newick("((a,b)80.2/95,c,d);", 1000).unwrap();
        assert_eq!(tree.supports, vec![Some(95.0)]);
    }

    #[test]
    fn test_quoted_labels_and_comments() {
        let root = parse_newick("('sp|P1|A human':1e-3,[&R] 'it''s':2) root ;").unwrap();
        assert_eq!(
            root.leaf_labels(),
            vec![Some("sp|P1|A human"), Some("it's")]
        );
        assert_eq!(root.children[0].length, Some(1e-3));
        assert_eq!(root.label.as_deref(), Some("root"));
    }

    #[test]
    fn test_missing_support_without_bootstrap_is_fine() {
        let tree = tree_from_newick("((a,b),c,d);", 0).unwrap();
        assert_eq!(tree.supports, vec![None]);
        assert!(tree.validate(4).is_ok());

        let bootstrapped = tree_from_newick("((a,b),c,d);", 100).unwrap();
        assert!(bootstrapped.validate(4).is_err());
    }

    #[test]
    fn test_malformed_trees_rejected() {
        assert!(parse_newick("(a,b").is_err());
        assert!(parse_newick("(a,b)").is_err());
        assert!(parse_newick("(a,b);trailing").is_err());
        assert!(tree_from_newick("(a,:0.1);", 0).is_err());
    }
}
