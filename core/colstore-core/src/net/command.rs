//! Parses one line of the command language (section 6) into an
//! [`OperatorDescriptor`] the executor can dispatch, or a [`ParsedCommand::Load`]
//! for the bulk-load handshake the server special-cases before parsing.
//!
//! Grounded in `original_source/parse.c`'s `parse_command` and its
//! `parse_*` family (`parse_delete`, `parse_update`, `parse_join`,
//! `parse_aggregate`, ...); each `sscanf`-based C parser becomes a small
//! function here operating on `&str` slices instead of fixed-size C buffers.

use crate::engine::executor::{JoinKind, OperatorDescriptor, SelectSource, ValueHandle};
use crate::error::{DbxError, DbxResult};
use crate::types::IndexKind;

/// Either a normal operator, ready for [`crate::engine::executor::execute`],
/// or the bulk-load handshake header, which the server must special-case
/// (it is followed by raw binary row data rather than another command
/// line — section 6's "bulk-load handshake").
#[derive(Debug, Clone)]
pub enum ParsedCommand {
    Op(OperatorDescriptor),
    Load { table: String, num_cols: usize },
}

/// Parses one line. Returns `Ok(None)` for a blank line or a `--` comment
/// (section 6: "Lines beginning with `--` are comments").
pub fn parse_line(line: &str) -> DbxResult<Option<ParsedCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("--") {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix("load(") {
        return parse_load(rest).map(Some);
    }

    // `shutdown` carries no argument list (section 6's grammar lists it bare,
    // unlike every other operator); special-case it before assuming `(...)`.
    if line == "shutdown" {
        return Ok(Some(ParsedCommand::Op(OperatorDescriptor::Shutdown)));
    }

    let (out, call) = split_assignment(line);
    let (name, args) = split_call(call)?;

    let op = match name {
        "create" => parse_create(&args)?,
        "relational_insert" => parse_insert(&args)?,
        "relational_delete" => parse_delete(&args)?,
        "relational_update" => parse_update(&args)?,
        "select" => parse_select(&args, out)?,
        "fetch" => parse_fetch(&args, out)?,
        "min" => parse_min_max(&args, out, true)?,
        "max" => parse_min_max(&args, out, false)?,
        "sum" => parse_sum_avg(&args, out, true)?,
        "avg" => parse_sum_avg(&args, out, false)?,
        "add" => parse_add_sub(&args, out, true)?,
        "sub" => parse_add_sub(&args, out, false)?,
        "join" => parse_join(&args, out)?,
        "print" => OperatorDescriptor::Print { handles: args.iter().map(|s| s.to_string()).collect() },
        "batch_queries" => OperatorDescriptor::BatchQueries,
        "batch_execute" => OperatorDescriptor::BatchExecute,
        "shutdown" => OperatorDescriptor::Shutdown,
        other => return Err(DbxError::IncorrectFormat(format!("unknown command '{other}'"))),
    };
    Ok(Some(ParsedCommand::Op(op)))
}

/// Splits `h=select(...)` into (`Some("h")`, `"select(...)"`); an unassigned
/// command like `shutdown` or `print(...)` returns (`None`, the whole line).
/// Only the first `=` before the first `(` counts, so `select(...,"a=b")`
/// (not part of this grammar, but defensive) is not mis-split.
fn split_assignment(line: &str) -> (Option<&str>, &str) {
    let paren = line.find('(').unwrap_or(line.len());
    match line[..paren].find('=') {
        Some(eq) => (Some(line[..eq].trim()), line[eq + 1..].trim()),
        None => (None, line),
    }
}

/// Splits `name(a,b,c)` into (`"name"`, `["a","b","c"]`).
fn split_call(call: &str) -> DbxResult<(&str, Vec<&str>)> {
    let open = call.find('(').ok_or_else(|| DbxError::IncorrectFormat(format!("malformed command '{call}'")))?;
    let close = call
        .rfind(')')
        .ok_or_else(|| DbxError::IncorrectFormat(format!("malformed command '{call}'")))?;
    if close < open {
        return Err(DbxError::IncorrectFormat(format!("malformed command '{call}'")));
    }
    let name = call[..open].trim();
    let body = call[open + 1..close].trim();
    let args = if body.is_empty() { Vec::new() } else { body.split(',').map(str::trim).collect() };
    Ok((name, args))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

/// Splits `"db.table"`/`"db.table.column"` into its rightmost one or two
/// segments, discarding the leading `db` component — the engine keeps at
/// most one active database, so only the table/column parts matter
/// downstream (mirrors `engine::context::Engine::split_fq_name`, applied
/// here before an `Engine` even exists).
fn split_fq(fq: &str) -> DbxResult<Vec<&str>> {
    let parts: Vec<&str> = fq.split('.').collect();
    if parts.len() < 2 {
        return Err(DbxError::IncorrectFormat(format!("expected a qualified name, got '{fq}'")));
    }
    Ok(parts)
}

fn parse_int(s: &str) -> DbxResult<i32> {
    s.parse().map_err(|_| DbxError::IncorrectFormat(format!("expected an integer, got '{s}'")))
}

fn parse_bound(s: &str) -> DbxResult<Option<i32>> {
    if s == "null" {
        Ok(None)
    } else {
        parse_int(s).map(Some)
    }
}

fn require_out(out: Option<&str>) -> DbxResult<String> {
    out.map(str::to_string).ok_or_else(|| DbxError::IncorrectFormat("expected an assigned handle".into()))
}

fn require_out_pair(out: Option<&str>) -> DbxResult<(String, String)> {
    let out = out.ok_or_else(|| DbxError::IncorrectFormat("expected two assigned handles".into()))?;
    let (a, b) = out
        .split_once(',')
        .ok_or_else(|| DbxError::IncorrectFormat(format!("expected two comma-separated handles, got '{out}'")))?;
    Ok((a.trim().to_string(), b.trim().to_string()))
}

/// A bare `col` or `result` name used as a value handle in `min`/`max`/`sum`/
/// `avg`/`add`/`sub` resolves as a column if it looks fully-qualified
/// (contains a `.`), else as a prior Result (`parse_aggregate`'s
/// catalog-then-client-lookup fallback, simplified here to a syntactic
/// rule since this parser has no catalog to consult).
fn value_handle(s: &str) -> ValueHandle {
    if s.contains('.') {
        ValueHandle::Column(s.to_string())
    } else {
        ValueHandle::Result(s.to_string())
    }
}

fn parse_create(args: &[&str]) -> DbxResult<OperatorDescriptor> {
    let kind = *args.first().ok_or_else(|| DbxError::IncorrectFormat("create() requires a kind".into()))?;
    match kind {
        "db" => {
            let name = args.get(1).ok_or_else(|| DbxError::IncorrectFormat("create(db,...) requires a name".into()))?;
            Ok(OperatorDescriptor::CreateDb { name: unquote(name).to_string() })
        }
        "tbl" => {
            let name = args.get(1).ok_or_else(|| DbxError::IncorrectFormat("create(tbl,...) requires a name".into()))?;
            let ncols = args
                .get(3)
                .ok_or_else(|| DbxError::IncorrectFormat("create(tbl,...) requires a column count".into()))?;
            Ok(OperatorDescriptor::CreateTable {
                table: unquote(name).to_string(),
                col_capacity: ncols.parse().map_err(|_| DbxError::IncorrectFormat(format!("bad column count '{ncols}'")))?,
            })
        }
        "col" => {
            let name = args.get(1).ok_or_else(|| DbxError::IncorrectFormat("create(col,...) requires a name".into()))?;
            let fq = args.get(2).ok_or_else(|| DbxError::IncorrectFormat("create(col,...) requires db.table".into()))?;
            let parts = split_fq(fq)?;
            let table = parts[parts.len() - 1];
            Ok(OperatorDescriptor::CreateColumn { table: table.to_string(), column: unquote(name).to_string() })
        }
        "idx" => {
            let fq = args.get(1).ok_or_else(|| DbxError::IncorrectFormat("create(idx,...) requires db.table.column".into()))?;
            let parts = split_fq(fq)?;
            if parts.len() < 3 {
                return Err(DbxError::IncorrectFormat(format!("expected db.table.column, got '{fq}'")));
            }
            let table = parts[parts.len() - 2];
            let column = parts[parts.len() - 1];
            let structure = args.get(2).copied().unwrap_or("");
            let clustering = args.get(3).copied().unwrap_or("");
            let kind = match (structure, clustering) {
                ("sorted", "clustered") => IndexKind::SortedClustered,
                ("sorted", "unclustered") => IndexKind::SortedUnclustered,
                ("btree", "clustered") => IndexKind::BTreeClustered,
                ("btree", "unclustered") => IndexKind::BTreeUnclustered,
                _ => return Err(DbxError::IncorrectFormat(format!("bad index spec '{structure},{clustering}'"))),
            };
            Ok(OperatorDescriptor::CreateIndex { table: table.to_string(), column: column.to_string(), kind })
        }
        other => Err(DbxError::IncorrectFormat(format!("unknown create kind '{other}'"))),
    }
}

fn parse_insert(args: &[&str]) -> DbxResult<OperatorDescriptor> {
    let fq = args.first().ok_or_else(|| DbxError::IncorrectFormat("relational_insert() requires a table".into()))?;
    let parts = split_fq(fq)?;
    let table = parts[parts.len() - 1].to_string();
    let values = args[1..].iter().map(|s| parse_int(s)).collect::<DbxResult<Vec<_>>>()?;
    Ok(OperatorDescriptor::Insert { table, values })
}

fn parse_delete(args: &[&str]) -> DbxResult<OperatorDescriptor> {
    if args.len() != 2 {
        return Err(DbxError::IncorrectFormat("relational_delete() requires (table, positions)".into()));
    }
    let parts = split_fq(args[0])?;
    let table = parts[parts.len() - 1].to_string();
    Ok(OperatorDescriptor::Delete { table, positions: args[1].to_string() })
}

fn parse_update(args: &[&str]) -> DbxResult<OperatorDescriptor> {
    if args.len() != 3 {
        return Err(DbxError::IncorrectFormat("relational_update() requires (column, positions, newval)".into()));
    }
    let parts = split_fq(args[0])?;
    if parts.len() < 3 {
        return Err(DbxError::IncorrectFormat(format!("expected db.table.column, got '{}'", args[0])));
    }
    let table = parts[parts.len() - 2].to_string();
    let column = parts[parts.len() - 1].to_string();
    Ok(OperatorDescriptor::Update {
        table,
        column,
        positions: args[1].to_string(),
        new_val: parse_int(args[2])?,
    })
}

fn parse_select(args: &[&str], out: Option<&str>) -> DbxResult<OperatorDescriptor> {
    let out = require_out(out)?;
    match args.len() {
        3 => Ok(OperatorDescriptor::Select {
            source: SelectSource::Column(args[0].to_string()),
            lo: parse_bound(args[1])?,
            hi: parse_bound(args[2])?,
            out,
        }),
        4 => Ok(OperatorDescriptor::Select {
            source: SelectSource::PositionValue { positions: args[0].to_string(), values: args[1].to_string() },
            lo: parse_bound(args[2])?,
            hi: parse_bound(args[3])?,
            out,
        }),
        _ => Err(DbxError::IncorrectFormat("select() takes 3 or 4 arguments".into())),
    }
}

fn parse_fetch(args: &[&str], out: Option<&str>) -> DbxResult<OperatorDescriptor> {
    if args.len() != 2 {
        return Err(DbxError::IncorrectFormat("fetch() requires (column, positions)".into()));
    }
    Ok(OperatorDescriptor::Fetch { column: args[0].to_string(), positions: args[1].to_string(), out: require_out(out)? })
}

fn parse_min_max(args: &[&str], out: Option<&str>, want_min: bool) -> DbxResult<OperatorDescriptor> {
    match args.len() {
        1 => {
            let out = require_out(out)?;
            let values = value_handle(args[0]);
            Ok(if want_min { OperatorDescriptor::Min { values, out } } else { OperatorDescriptor::Max { values, out } })
        }
        2 => {
            let out = require_out_pair(out)?;
            let positions = value_handle(args[0]);
            let values = value_handle(args[1]);
            Ok(if want_min {
                OperatorDescriptor::MinWithPositions { positions, values, out }
            } else {
                OperatorDescriptor::MaxWithPositions { positions, values, out }
            })
        }
        _ => Err(DbxError::IncorrectFormat("min()/max() take 1 or 2 arguments".into())),
    }
}

fn parse_sum_avg(args: &[&str], out: Option<&str>, is_sum: bool) -> DbxResult<OperatorDescriptor> {
    if args.len() != 1 {
        return Err(DbxError::IncorrectFormat("sum()/avg() take exactly one argument".into()));
    }
    let out = require_out(out)?;
    let input = value_handle(args[0]);
    Ok(if is_sum { OperatorDescriptor::Sum { input, out } } else { OperatorDescriptor::Avg { input, out } })
}

fn parse_add_sub(args: &[&str], out: Option<&str>, is_add: bool) -> DbxResult<OperatorDescriptor> {
    if args.len() != 2 {
        return Err(DbxError::IncorrectFormat("add()/sub() require exactly two arguments".into()));
    }
    let out = require_out(out)?;
    let lhs = value_handle(args[0]);
    let rhs = value_handle(args[1]);
    Ok(if is_add { OperatorDescriptor::Add { lhs, rhs, out } } else { OperatorDescriptor::Sub { lhs, rhs, out } })
}

fn parse_join(args: &[&str], out: Option<&str>) -> DbxResult<OperatorDescriptor> {
    if args.len() != 5 {
        return Err(DbxError::IncorrectFormat(
            "join() requires (val1,pos1,val2,pos2,{hash|nested-loop})".into(),
        ));
    }
    let kind = match args[4] {
        "hash" => JoinKind::Hash,
        "nested-loop" => JoinKind::NestedLoop,
        other => return Err(DbxError::IncorrectFormat(format!("unknown join kind '{other}'"))),
    };
    Ok(OperatorDescriptor::Join {
        val_l: args[0].to_string(),
        pos_l: args[1].to_string(),
        val_r: args[2].to_string(),
        pos_r: args[3].to_string(),
        kind,
        out: require_out_pair(out)?,
    })
}

/// Parses `<db.table>,<num_cols>)` — the remainder of a `load(...)` line
/// after the already-stripped `load(` prefix (`server.c`'s `handle_client`
/// strips a `load ` prefix and `sscanf`s `"%[^,],%d"` from what remains).
fn parse_load(rest: &str) -> DbxResult<ParsedCommand> {
    let body = rest
        .strip_suffix(')')
        .ok_or_else(|| DbxError::IncorrectFormat("malformed load(...)".into()))?;
    let (table, num_cols) = body
        .split_once(',')
        .ok_or_else(|| DbxError::IncorrectFormat("load() requires (table, num_cols)".into()))?;
    let parts = split_fq(table.trim())?;
    let table = parts[parts.len() - 1].to_string();
    let num_cols: usize = num_cols
        .trim()
        .parse()
        .map_err(|_| DbxError::IncorrectFormat(format!("bad column count '{num_cols}'")))?;
    Ok(ParsedCommand::Load { table, num_cols })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(line: &str) -> OperatorDescriptor {
        match parse_line(line).unwrap().unwrap() {
            ParsedCommand::Op(op) => op,
            other => panic!("expected an operator, got {other:?}"),
        }
    }

    #[test]
    fn blank_and_comment_lines_parse_as_none() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("-- a comment").unwrap().is_none());
    }

    #[test]
    fn parses_create_db_and_table_and_column_and_index() {
        assert!(matches!(op(r#"create(db,"d")"#), OperatorDescriptor::CreateDb { name } if name == "d"));
        assert!(matches!(
            op(r#"create(tbl,"t",d,2)"#),
            OperatorDescriptor::CreateTable { table, col_capacity: 2 } if table == "t"
        ));
        assert!(matches!(
            op(r#"create(col,"x",d.t)"#),
            OperatorDescriptor::CreateColumn { table, column } if table == "t" && column == "x"
        ));
        assert!(matches!(
            op("create(idx,d.t.x,btree,clustered)"),
            OperatorDescriptor::CreateIndex { table, column, kind: IndexKind::BTreeClustered }
                if table == "t" && column == "x"
        ));
    }

    #[test]
    fn parses_insert_delete_update() {
        assert!(matches!(
            op("relational_insert(d.t,5,2,9)"),
            OperatorDescriptor::Insert { table, values } if table == "t" && values == vec![5, 2, 9]
        ));
        assert!(matches!(
            op("relational_delete(d.t,p)"),
            OperatorDescriptor::Delete { table, positions } if table == "t" && positions == "p"
        ));
        assert!(matches!(
            op("relational_update(d.t.c,p,10)"),
            OperatorDescriptor::Update { table, column, positions, new_val: 10 }
                if table == "t" && column == "c" && positions == "p"
        ));
    }

    #[test]
    fn parses_select_forms_and_null_bounds() {
        match op("p=select(d.t.x,2,8)") {
            OperatorDescriptor::Select { source: SelectSource::Column(c), lo: Some(2), hi: Some(8), out } => {
                assert_eq!(c, "d.t.x");
                assert_eq!(out, "p");
            }
            other => panic!("unexpected {other:?}"),
        }
        match op("p=select(d.t.x,null,null)") {
            OperatorDescriptor::Select { lo: None, hi: None, .. } => {}
            other => panic!("unexpected {other:?}"),
        }
        match op("p=select(pos,val,2,null)") {
            OperatorDescriptor::Select {
                source: SelectSource::PositionValue { positions, values },
                lo: Some(2),
                hi: None,
                ..
            } => {
                assert_eq!(positions, "pos");
                assert_eq!(values, "val");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_min_max_scalar_and_with_positions() {
        match op("mv=min(d.t.a)") {
            OperatorDescriptor::Min { values: ValueHandle::Column(c), out } => {
                assert_eq!(c, "d.t.a");
                assert_eq!(out, "mv");
            }
            other => panic!("unexpected {other:?}"),
        }
        match op("mp,mv=min(p,d.t.a)") {
            OperatorDescriptor::MinWithPositions { positions: ValueHandle::Result(p), out, .. } => {
                assert_eq!(p, "p");
                assert_eq!(out, ("mp".to_string(), "mv".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_join_argument_order_and_kind() {
        match op("lp,rp=join(lv,lp0,rv,rp0,nested-loop)") {
            OperatorDescriptor::Join { val_l, pos_l, val_r, pos_r, kind: JoinKind::NestedLoop, out } => {
                assert_eq!((val_l.as_str(), pos_l.as_str(), val_r.as_str(), pos_r.as_str()), ("lv", "lp0", "rv", "rp0"));
                assert_eq!(out, ("lp".to_string(), "rp".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_print_batch_and_shutdown() {
        assert!(matches!(op("print(p1,p2)"), OperatorDescriptor::Print { handles } if handles == vec!["p1", "p2"]));
        assert!(matches!(op("batch_queries()"), OperatorDescriptor::BatchQueries));
        assert!(matches!(op("batch_execute()"), OperatorDescriptor::BatchExecute));
        assert!(matches!(op("shutdown"), OperatorDescriptor::Shutdown));
    }

    #[test]
    fn parses_load_header() {
        match parse_line("load(d.t,3)").unwrap().unwrap() {
            ParsedCommand::Load { table, num_cols } => {
                assert_eq!(table, "t");
                assert_eq!(num_cols, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_incorrect_format() {
        assert!(parse_line("frobnicate(1,2)").is_err());
    }
}
