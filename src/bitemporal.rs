//! Bitemporal tables.
//!
//! A bitemporal table carries an `_asof` column next to its data: every row is
//! one version of the row with that index key, as known from its as-of time
//! onwards. Reading collapses the versions known at a cutoff into one row per
//! key, detecting updates finds which rows of a new batch actually change
//! what is known.

use std::collections::BTreeMap;

// used for the as-of tags
use chrono::NaiveDateTime;

use crate::dates;
use crate::error::{EncoderError, Result};
use crate::table::{ASOF, Scalar, Table};

/// What is known is taken as of this cutoff.
#[derive(Clone, Copy, Debug)]
pub enum Cutoff<'a> {
    At(NaiveDateTime),
    /// Per index key: the latest as-of of that key in another bitemporal table.
    /// Keys absent from it are dropped.
    PerIndex(&'a Table),
}

/// Which version of a row a read keeps.
#[derive(Clone, Copy, Default)]
pub enum Pick<'a> {
    #[default]
    Last,
    First,
    /// Folds the versions of one key, oldest first, into a single row. The
    /// `_asof` cell is not part of the rows handed over or returned.
    Reduce(&'a dyn Fn(&[&[Scalar]]) -> Vec<Scalar>),
}

fn latest_per_index(table: &Table) -> Result<BTreeMap<Scalar, NaiveDateTime>> {
    let position = table.column_position(ASOF).ok_or_else(|| {
        EncoderError::NotBitemporal(format!("cutoff table has no {} column", ASOF))
    })?;
    let mut latest: BTreeMap<Scalar, NaiveDateTime> = BTreeMap::new();
    for (key, row) in table.index().iter().zip(table.rows()) {
        if let Some(asof) = row[position].as_datetime() {
            latest
                .entry(key.clone())
                .and_modify(|t| *t = (*t).max(asof))
                .or_insert(asof);
        }
    }
    Ok(latest)
}

fn without(row: &[Scalar], position: usize) -> Vec<Scalar> {
    row.iter()
        .enumerate()
        .filter(|(i, _)| *i != position)
        .map(|(_, cell)| cell.clone())
        .collect()
}

/// Collapses a bitemporal table into one row per index key as known at the
/// cutoff. Tables without `_asof` come back unchanged.
///
/// Without a cutoff every version counts. Within a key the versions are
/// ordered by as-of with ties kept in row order, and the result is ordered by
/// index key. The `_asof` column is dropped and the index name kept.
pub fn bitemporal_read(table: &Table, cutoff: Option<Cutoff>, pick: Pick) -> Result<Table> {
    let Some(asof_position) = table.column_position(ASOF) else {
        return Ok(table.clone());
    };
    let per_index = match cutoff {
        Some(Cutoff::PerIndex(other)) => Some(latest_per_index(other)?),
        _ => None,
    };
    let rows = table.rows();
    let known = |i: usize| -> bool {
        let asof = rows[i][asof_position].as_datetime();
        match (&cutoff, &per_index) {
            (None, _) => true,
            (Some(Cutoff::At(t)), _) => asof.is_some_and(|a| a <= *t),
            (Some(Cutoff::PerIndex(_)), Some(latest)) => match (asof, latest.get(&table.index()[i])) {
                (Some(a), Some(t)) => a <= *t,
                _ => false,
            },
            (Some(Cutoff::PerIndex(_)), None) => false,
        }
    };
    let mut survivors: Vec<usize> = (0..table.len()).filter(|&i| known(i)).collect();
    survivors.sort_by(|&a, &b| rows[a][asof_position].cmp(&rows[b][asof_position]));

    let mut groups: BTreeMap<&Scalar, Vec<usize>> = BTreeMap::new();
    for i in survivors {
        groups.entry(&table.index()[i]).or_default().push(i);
    }

    let columns: Vec<String> = table.columns().iter().filter(|c| *c != ASOF).cloned().collect();
    let mut index = Vec::with_capacity(groups.len());
    let mut picked = Vec::with_capacity(groups.len());
    for (key, positions) in groups {
        let row = match pick {
            Pick::Last => without(&rows[positions[positions.len() - 1]], asof_position),
            Pick::First => without(&rows[positions[0]], asof_position),
            Pick::Reduce(reduce) => {
                let versions: Vec<Vec<Scalar>> =
                    positions.iter().map(|&p| without(&rows[p], asof_position)).collect();
                let slices: Vec<&[Scalar]> = versions.iter().map(|v| v.as_slice()).collect();
                let row = reduce(&slices[..]);
                if row.len() != columns.len() {
                    return Err(EncoderError::Shape(format!(
                        "reduction returned {} cells for {} columns",
                        row.len(),
                        columns.len()
                    )));
                }
                row
            }
        };
        index.push(key.clone());
        picked.push(row);
    }
    let mut result = Table::new(index, columns, picked)?;
    result.set_index_name(table.index_name().map(str::to_string));
    result.set_series(table.is_series());
    Ok(result)
}

fn same_row(new: &Table, i: usize, prev: &Table, p: usize) -> bool {
    if new.columns().len() != prev.columns().len() {
        return false;
    }
    new.columns().iter().enumerate().all(|(c, label)| match prev.column_position(label) {
        Some(q) => new.rows()[i][c] == prev.rows()[p][q],
        None => false,
    })
}

/// The rows of `new` that change what `history` knows.
///
/// An unstamped batch is stamped with `asof`, or now. Each row is compared,
/// column by label, with the version of its key that `history` knew at the
/// row's own as-of, so a batch may carry several versions of one key. Keys
/// without history always count as changed, as do rows whose columns differ
/// from the known version. A history without `_asof` is known at all times.
/// The returned rows keep their stamps.
pub fn bitemporal_updates(new: &Table, history: &Table, asof: Option<NaiveDateTime>) -> Result<Table> {
    let stamped = if new.is_bitemporal() {
        new.clone()
    } else {
        new.stamp(asof.unwrap_or_else(dates::now))
    };
    let stamp_position = stamped
        .column_position(ASOF)
        .ok_or_else(|| EncoderError::Invariant(format!("stamped batch has no {} column", ASOF)))?;
    let raw = stamped.drop_column(ASOF);
    let prev = history.drop_column(ASOF);

    // versions of each key, oldest first, ties in row order
    let history_asof = history.column_position(ASOF);
    let mut versions: BTreeMap<&Scalar, Vec<(NaiveDateTime, usize)>> = BTreeMap::new();
    for (p, key) in history.index().iter().enumerate() {
        let known = match history_asof {
            Some(c) => history.rows()[p][c].as_datetime(),
            None => Some(NaiveDateTime::MIN),
        };
        if let Some(t) = known {
            versions.entry(key).or_default().push((t, p));
        }
    }
    for list in versions.values_mut() {
        list.sort_by_key(|&(t, _)| t);
    }

    let changed: Vec<usize> = (0..raw.len())
        .filter(|&i| {
            let cutoff = stamped.rows()[i][stamp_position].as_datetime();
            let known = versions.get(&raw.index()[i]).and_then(|list| {
                list.iter()
                    .rev()
                    .find(|&&(t, _)| cutoff.is_none_or(|c| t <= c))
                    .map(|&(_, p)| p)
            });
            match known {
                Some(p) => !same_row(&raw, i, &prev, p),
                None => true,
            }
        })
        .collect();
    Ok(stamped.select(&changed))
}

/// Appends the real updates of `new` to `history`. A history that is not
/// bitemporal is replaced by the stamped batch.
pub fn bitemporal_merge(history: &Table, new: &Table, asof: Option<NaiveDateTime>) -> Result<Table> {
    if !history.is_bitemporal() {
        return Ok(if new.is_bitemporal() {
            new.clone()
        } else {
            new.stamp(asof.unwrap_or_else(dates::now))
        });
    }
    let updates = bitemporal_updates(new, history, asof)?;
    Ok(history.concat(&updates))
}
