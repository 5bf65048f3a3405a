//! DIMACS CNF parser and writer for the parsat SAT solver.
//!
//! The parser tokenizes its input by whitespace, skips `c` comment and `p`
//! header lines, rejects `x` XOR-clause lines and reads every other line as a
//! clause of signed integers terminated by `0`.
//!
//! Variables are remapped from their DIMACS names to a dense 0-based range in
//! order of first appearance. The reverse map is retained so solutions can be
//! reported under the original names.

use std::{io, mem::replace};

use rustc_hash::FxHashMap;

use parsat_formula::{CnfFormula, Lit, Var};

use anyhow::Error;
use thiserror::Error;

/// Possible errors while parsing a DIMACS CNF formula.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error(
        "line {}: Unexpected character in DIMACS CNF input: '{}'",
        line,
        unexpected
    )]
    UnexpectedInput { line: usize, unexpected: char },
    #[error("line {}: Literal is too large", line)]
    LiteralTooLarge { line: usize },
    #[error("line {}: Unterminated clause", line)]
    UnterminatedClause { line: usize },
    #[error("line {}: Cannot read XOR clauses", line)]
    XorClause { line: usize },
    #[error("line {}: Too many distinct variables", line)]
    TooManyVariables { line: usize },
    #[error("Parser invoked after a previous error")]
    PreviousError,
}

/// Parser for DIMACS CNF files.
///
/// The input can be consumed in chunks; the final formula and the variable
/// name table are available after [`eof`](DimacsParser::eof) was called.
#[derive(Default)]
pub struct DimacsParser {
    formula: CnfFormula,
    partial_clause: Vec<Lit>,
    names: Vec<usize>,
    name_to_var: FxHashMap<usize, Var>,

    line_number: usize,
    clause_count: usize,
    partial_lit: usize,
    negate_next_lit: bool,

    in_lit: bool,
    in_comment: bool,
    start_of_line: bool,
    error: bool,
}

impl DimacsParser {
    /// Create a new DIMACS CNF parser.
    pub fn new() -> DimacsParser {
        DimacsParser {
            formula: CnfFormula::new(),
            partial_clause: vec![],
            names: vec![],
            name_to_var: FxHashMap::default(),

            line_number: 1,
            clause_count: 0,
            partial_lit: 0,
            negate_next_lit: false,

            in_lit: false,
            in_comment: false,
            start_of_line: true,
            error: false,
        }
    }

    /// Parse the given input to the end.
    pub fn parse(input: impl io::Read) -> Result<DimacsParser, Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = Self::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);
        }
        parser.eof()?;

        Ok(parser)
    }

    /// Parse a chunk of input.
    ///
    /// After parsing the last chunk call the [`eof`](DimacsParser::eof)
    /// method. If this method returns an error, the parser is in an invalid
    /// state and cannot parse further chunks.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }
        for &byte in chunk.iter() {
            if byte == b'\n' {
                self.line_number += 1;
            }
            match byte {
                b'\n' | b'\r' if self.in_comment => {
                    self.in_comment = false;
                    self.start_of_line = true;
                }
                _ if self.in_comment => (),
                b'0'..=b'9' => {
                    self.in_lit = true;
                    let digit = (byte - b'0') as usize;

                    self.partial_lit = match self
                        .partial_lit
                        .checked_mul(10)
                        .and_then(|lit| lit.checked_add(digit))
                    {
                        Some(lit) => lit,
                        None => {
                            self.error = true;
                            return Err(ParserError::LiteralTooLarge {
                                line: self.line_number,
                            });
                        }
                    };

                    self.start_of_line = false;
                }
                b'-' if !self.negate_next_lit && !self.in_lit => {
                    self.negate_next_lit = true;
                    self.start_of_line = false;
                }
                b' ' | b'\t' | b'\n' | b'\r' if !self.negate_next_lit || self.in_lit => {
                    self.finish_literal()?;
                    self.negate_next_lit = false;
                    self.in_lit = false;
                    self.partial_lit = 0;
                    self.start_of_line = byte == b'\n' || byte == b'\r';
                }
                b'c' | b'p' if self.start_of_line => {
                    self.in_comment = true;
                }
                b'x' if self.start_of_line => {
                    self.error = true;
                    return Err(ParserError::XorClause {
                        line: self.line_number,
                    });
                }
                _ => {
                    self.error = true;
                    return Err(ParserError::UnexpectedInput {
                        line: self.line_number,
                        unexpected: byte as char,
                    });
                }
            }
        }

        Ok(())
    }

    /// Finish parsing the input.
    pub fn eof(&mut self) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }

        self.finish_literal()?;
        self.in_lit = false;
        self.negate_next_lit = false;
        self.partial_lit = 0;

        if !self.partial_clause.is_empty() {
            self.error = true;
            return Err(ParserError::UnterminatedClause {
                line: self.line_number,
            });
        }

        Ok(())
    }

    /// Take the parsed formula out of the parser.
    ///
    /// The formula is over the remapped variables; use
    /// [`names`](DimacsParser::names) to recover the original DIMACS names.
    pub fn take_formula(&mut self) -> CnfFormula {
        let mut new_formula = CnfFormula::new();
        new_formula.set_var_count(self.formula.var_count());
        replace(&mut self.formula, new_formula)
    }

    /// The original DIMACS name of each solver variable, in registration
    /// order.
    pub fn names(&self) -> &[usize] {
        &self.names
    }

    /// Number of clauses parsed so far.
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// Number of distinct variables seen so far.
    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    fn finish_literal(&mut self) -> Result<(), ParserError> {
        if self.in_lit {
            if self.partial_lit == 0 {
                self.formula.add_clause(&self.partial_clause);
                self.partial_clause.clear();
                self.clause_count += 1;
            } else {
                let var = self.remap(self.partial_lit)?;
                self.partial_clause.push(var.lit(!self.negate_next_lit));
            }
        }
        Ok(())
    }

    fn remap(&mut self, name: usize) -> Result<Var, ParserError> {
        if let Some(&var) = self.name_to_var.get(&name) {
            return Ok(var);
        }
        if self.names.len() >= Var::max_count() {
            self.error = true;
            return Err(ParserError::TooManyVariables {
                line: self.line_number,
            });
        }
        let var = Var::from_index(self.names.len());
        self.names.push(name);
        self.name_to_var.insert(name, var);
        Ok(var)
    }
}

/// Write a DIMACS CNF header.
///
/// Can be used with [`write_dimacs_clauses`] to implement incremental
/// writing.
pub fn write_dimacs_header(
    target: &mut impl io::Write,
    var_count: usize,
    clause_count: usize,
) -> io::Result<()> {
    writeln!(target, "p cnf {} {}", var_count, clause_count)
}

/// Write an iterator of clauses as headerless DIMACS CNF.
///
/// Can be used with [`write_dimacs_header`] to implement incremental
/// writing.
pub fn write_dimacs_clauses<'a>(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = &'a [Lit]>,
) -> io::Result<()> {
    for clause in clauses {
        for &lit in clause.iter() {
            itoa::write(&mut *target, lit.to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }

    Ok(())
}

/// Write a formula in DIMACS CNF format.
///
/// Variables are written under their 1-based indices, i.e. with the identity
/// naming.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    write_dimacs_header(target, formula.var_count(), formula.len())?;
    write_dimacs_clauses(target, formula.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    use parsat_formula::cnf_formula;

    fn parse_str(input: &str) -> Result<DimacsParser, Error> {
        DimacsParser::parse(input.as_bytes())
    }

    #[test]
    fn parse_simple_formula() {
        let mut parser = parse_str("p cnf 3 2\n1 -3 0\n2 3 -1 0\n").unwrap();

        assert_eq!(parser.clause_count(), 2);
        assert_eq!(parser.var_count(), 3);
        assert_eq!(parser.names(), &[1, 3, 2]);

        let formula = parser.take_formula();
        let expected = cnf_formula![
            1, -2;
            3, 2, -1;
        ];
        assert_eq!(formula, expected);
    }

    #[test]
    fn remaps_in_order_of_first_appearance() {
        let parser = parse_str("5 3 0\n5 1 0\n").unwrap();
        assert_eq!(parser.names(), &[5, 3, 1]);
    }

    #[test]
    fn skips_comments_and_header() {
        let parser = parse_str("c a comment\np cnf 9 9\nc another\n1 2 0\n").unwrap();
        assert_eq!(parser.clause_count(), 1);
        assert_eq!(parser.var_count(), 2);
    }

    #[test]
    fn rejects_xor_clauses() {
        let result = parse_str("1 2 0\nx3 4 0\n");
        let err = result.err().unwrap();
        let parser_err = err.downcast::<ParserError>().unwrap();
        match parser_err {
            ParserError::XorClause { line } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(format!("{}", ParserError::XorClause { line: 2 })
            .contains("Cannot read XOR clauses"));
    }

    #[test]
    fn rejects_garbage() {
        let result = parse_str("1 foo 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unterminated_clause() {
        let result = parse_str("1 2 0\n1 -2");
        let err = result.err().unwrap();
        let parser_err = err.downcast::<ParserError>().unwrap();
        match parser_err {
            ParserError::UnterminatedClause { .. } => (),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn accepts_tabs_and_missing_final_newline() {
        let parser = parse_str("1\t2 0\n-1\t-2 0").unwrap();
        assert_eq!(parser.clause_count(), 2);
    }

    #[test]
    fn empty_clause() {
        let mut parser = parse_str("0\n").unwrap();
        assert_eq!(parser.clause_count(), 1);
        let formula = parser.take_formula();
        assert_eq!(formula.iter().next().unwrap(), &[] as &[Lit]);
    }

    #[test]
    fn write_then_reparse_identity_order() {
        let formula = cnf_formula![
            1, 2, 3;
            -1, -2;
            2, -3;
        ];

        let mut bytes = vec![];
        write_dimacs(&mut bytes, &formula).unwrap();

        // Variables appear in index order in this formula, so the dense
        // remapping is the identity.
        let mut parser = DimacsParser::parse(&bytes[..]).unwrap();
        assert_eq!(parser.names(), &[1, 2, 3]);
        assert_eq!(parser.take_formula(), formula);
    }
}
