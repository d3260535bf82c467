//! Variable declarations and reduction signatures
//!
//! Users describe a reduction with declarations such as
//!
//! ```text
//! out = Vx(2)      result: one 2-vector per i
//! x   = Vx(3)      row-indexed argument
//! y   = Vy(3)      column-indexed argument
//! p   = Pm(1)      parameter
//! ```
//!
//! The first declaration is the result, the others are arguments. Each
//! argument may carry an explicit index (`x = Vx(3, 1)`); if one does, all
//! must, and the indices must be a permutation of `0..n`.

use std::collections::HashSet;
use std::fmt;

use genred_loader::SumIndex;

use crate::error::{Error, Result};

/// How a variable is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// One row per point of the first cloud (nx rows)
    Row,
    /// One row per point of the second cloud (ny rows)
    Column,
    /// Fixed size, independent of both clouds
    Parameter,
}

impl Category {
    /// Integer code used in `Var(index,dim,cat)` references
    pub fn code(self) -> u8 {
        match self {
            Self::Row => 0,
            Self::Column => 1,
            Self::Parameter => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Row),
            1 => Some(Self::Column),
            2 => Some(Self::Parameter),
            _ => None,
        }
    }

    /// The index an output of this category keeps; parameters have none
    pub fn sum_index(self) -> Option<SumIndex> {
        match self {
            Self::Row => Some(SumIndex::Row),
            Self::Column => Some(SumIndex::Column),
            Self::Parameter => None,
        }
    }
}

impl From<SumIndex> for Category {
    fn from(sum_index: SumIndex) -> Self {
        match sum_index {
            SumIndex::Row => Self::Row,
            SumIndex::Column => Self::Column,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row => write!(f, "row-indexed"),
            Self::Column => write!(f, "column-indexed"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

/// Dimension and category of one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarSpec {
    pub dim: usize,
    pub category: Category,
}

impl VarSpec {
    pub fn new(dim: usize, category: Category) -> Self {
        Self { dim, category }
    }
}

/// Operand specs in formula order, result first
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    specs: Vec<VarSpec>,
}

impl Signature {
    pub fn new(result: VarSpec, args: impl IntoIterator<Item = VarSpec>) -> Self {
        let mut specs = vec![result];
        specs.extend(args);
        Self { specs }
    }

    pub fn result(&self) -> VarSpec {
        self.specs[0]
    }

    pub fn args(&self) -> &[VarSpec] {
        &self.specs[1..]
    }

    /// Number of arguments (the result excluded)
    pub fn arity(&self) -> usize {
        self.specs.len() - 1
    }

    pub fn as_slice(&self) -> &[VarSpec] {
        &self.specs
    }

    /// Signature of a gradient reduction: `output`, then the forward
    /// arguments, then the incoming gradient shaped like the forward result.
    pub fn for_gradient(&self, output: VarSpec) -> Self {
        Self::new(output, self.args().iter().copied().chain(std::iter::once(self.result())))
    }
}

/// Output of [`parse_types`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTypes {
    /// `name=Var(index,dim,cat)` in index order
    pub aliases: Vec<String>,
    pub signature: Signature,
    pub sum_index: SumIndex,
}

struct Declaration {
    name: String,
    spec: VarSpec,
    index: Option<usize>,
}

/// Parse declarations into aliases, signature and sum index
pub fn parse_types<S: AsRef<str>>(declarations: &[S]) -> Result<ParsedTypes> {
    let (result_text, arg_texts) = declarations
        .split_first()
        .ok_or_else(|| Error::validation("", "no declarations given"))?;

    let result = parse_declaration(result_text.as_ref())?;
    if result.index.is_some() {
        return Err(Error::validation(result_text.as_ref(), "the result declaration takes no index"));
    }
    let sum_index = result
        .spec
        .category
        .sum_index()
        .ok_or_else(|| Error::validation(result_text.as_ref(), "the result cannot be a parameter"))?;

    if arg_texts.is_empty() {
        return Err(Error::validation(result_text.as_ref(), "a reduction needs at least one argument"));
    }

    let mut names = HashSet::from([result.name.clone()]);
    let mut args = Vec::with_capacity(arg_texts.len());
    for text in arg_texts {
        let decl = parse_declaration(text.as_ref())?;
        if !names.insert(decl.name.clone()) {
            return Err(Error::validation(text.as_ref(), format!("duplicate name {:?}", decl.name)));
        }
        args.push((text.as_ref(), decl));
    }

    let explicit = args.iter().filter(|(_, d)| d.index.is_some()).count();
    let mut slots: Vec<Option<Declaration>> = (0..args.len()).map(|_| None).collect();
    if explicit == 0 {
        for (position, (_, decl)) in args.into_iter().enumerate() {
            slots[position] = Some(decl);
        }
    } else {
        if explicit != args.len() {
            return Err(Error::validation(
                arg_texts[0].as_ref(),
                "either every argument declares an index or none does",
            ));
        }
        let n = args.len();
        for (text, decl) in args {
            let index = decl.index.unwrap_or_default();
            if index >= n {
                return Err(Error::validation(text, format!("index {index} out of range for {n} arguments")));
            }
            if slots[index].is_some() {
                return Err(Error::validation(text, format!("index {index} declared twice")));
            }
            slots[index] = Some(decl);
        }
    }

    // Every slot is filled: positional numbering, or n distinct in-range indices
    let ordered: Vec<Declaration> = slots.into_iter().flatten().collect();

    let aliases = ordered
        .iter()
        .enumerate()
        .map(|(index, d)| format!("{}=Var({},{},{})", d.name, index, d.spec.dim, d.spec.category.code()))
        .collect();
    let signature = Signature::new(result.spec, ordered.iter().map(|d| d.spec));

    Ok(ParsedTypes {
        aliases,
        signature,
        sum_index,
    })
}

fn parse_declaration(text: &str) -> Result<Declaration> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid = |reason: &str| Error::validation(text, reason);

    let (name, rest) = compact.split_once('=').ok_or_else(|| invalid("expected `name = Role(dim)`"))?;
    if name.is_empty() {
        return Err(invalid("empty variable name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') || name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid("variable names must be identifiers"));
    }

    let (role, inner) = rest
        .strip_suffix(')')
        .and_then(|r| r.split_once('('))
        .ok_or_else(|| invalid("expected `Role(dim)` after `=`"))?;

    let category = match role {
        "Vx" | "Vi" => Category::Row,
        "Vy" | "Vj" => Category::Column,
        "Pm" => Category::Parameter,
        other => return Err(invalid(&format!("unknown role {other:?} (expected Vx, Vi, Vy, Vj or Pm)"))),
    };

    let mut fields = inner.split(',');
    let dim = fields
        .next()
        .and_then(|d| d.parse::<usize>().ok())
        .ok_or_else(|| invalid("dimension must be a positive integer"))?;
    if dim == 0 {
        return Err(invalid("dimension must be a positive integer"));
    }
    let index = match fields.next() {
        None => None,
        Some(i) => Some(i.parse::<usize>().map_err(|_| invalid("index must be a non-negative integer"))?),
    };
    if fields.next().is_some() {
        return Err(invalid("too many fields, expected `Role(dim[, index])`"));
    }

    Ok(Declaration {
        name: name.to_string(),
        spec: VarSpec::new(dim, category),
        index,
    })
}
