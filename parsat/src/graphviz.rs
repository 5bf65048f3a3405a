//! GraphViz dump of the implication graph at conflicts.
//!
//! Only compiled with the `conflict-graph` feature. Every conflict writes a
//! `conflict-<worker>-<n>.dot` file with the current implication graph and
//! the conflicting clause, which renders nicely with `dot -Tsvg`.
use std::fs::File;
use std::io::{self, Write};

use partial_ref::{partial, PartialRef};

use crate::context::{Context, ImplGraphP, MessagesP, StatsP, TrailP};
use crate::prop::{Conflict, Reason};

/// Write the implication graph leading to the given conflict.
pub fn dump_conflict(
    mut ctx: partial!(Context, ImplGraphP, MessagesP, StatsP, TrailP),
    conflict: &Conflict,
) -> io::Result<()> {
    let path = format!(
        "conflict-{}-{}.dot",
        ctx.part(MessagesP).id(),
        ctx.part(StatsP).conflicts
    );
    let mut file = File::create(path)?;

    writeln!(file, "digraph implications {{")?;

    let impl_graph = ctx.part(ImplGraphP);

    for &lit in ctx.part(TrailP).trail() {
        let var = lit.var();
        writeln!(
            file,
            "    v{} [label=\"{} @ {}\"];",
            var.index(),
            lit,
            impl_graph.level(var)
        )?;

        // Level 0 antecedents may already be detached, their edges are not
        // drawn.
        if impl_graph.level(var) == 0 || impl_graph.reason(var).is_decision() {
            continue;
        }
        for &reason_lit in impl_graph.reason(var).lits() {
            if reason_lit.var() != var {
                writeln!(file, "    v{} -> v{};", reason_lit.index(), var.index())?;
            }
        }
    }

    writeln!(file, "    conflict [shape=box];")?;
    for &lit in conflict.lits() {
        writeln!(file, "    v{} -> conflict;", lit.index())?;
    }

    writeln!(file, "}}")
}
