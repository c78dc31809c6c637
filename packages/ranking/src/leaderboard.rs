use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use common::Answer;
use common::domain::{Contest, Contestant, Problem, Submission};

/// Penalty added per wrong submission preceding the accepted one: 20 minutes.
pub const WRONG_SUBMISSION_PENALTY_SECS: i64 = 1200;

/// Which audience a leaderboard computation serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Full, current standings. Staff-facing.
    Staff,
    /// Standings as of the freeze instant once the contest is frozen;
    /// verdicts for submissions at or after that instant are withheld until
    /// the operator reveals them.
    Public,
}

/// A contestant's result summary for one problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardCell {
    pub problem_id: i32,
    pub is_accepted: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    /// Non-accepted submissions strictly before the accepted one, or all
    /// judged submissions when the problem was never solved.
    pub wrong_submissions: u32,
    /// Zero unless the problem was accepted.
    pub penalty_seconds: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub contestant_id: i32,
    pub contestant_name: String,
    /// One cell per contest problem, in problem order.
    pub cells: Vec<LeaderboardCell>,
    /// Count of accepted cells.
    pub score: u32,
    /// Sum of cell penalties, in seconds.
    pub penalty: i64,
}

impl LeaderboardRow {
    /// Recompute the aggregates from the full cell set.
    fn refresh_totals(&mut self) {
        self.score = self.cells.iter().filter(|c| c.is_accepted).count() as u32;
        self.penalty = self.cells.iter().map(|c| c.penalty_seconds).sum();
    }

    /// Accepted-problem timestamps, most recent first. Comparator input.
    fn accepted_times_desc(&self) -> Vec<DateTime<Utc>> {
        let mut times: Vec<DateTime<Utc>> =
            self.cells.iter().filter_map(|c| c.accepted_at).collect();
        times.sort_by(|a, b| b.cmp(a));
        times
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub contest_id: i32,
    /// Rows in ranking order.
    pub rows: Vec<LeaderboardRow>,
}

impl Leaderboard {
    pub fn row(&self, contestant_id: i32) -> Option<&LeaderboardRow> {
        self.rows.iter().find(|r| r.contestant_id == contestant_id)
    }
}

/// Partial update for one cell, produced after judging one submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellUpdate {
    pub contestant_id: i32,
    pub cell: LeaderboardCell,
}

/// Compute one (contestant, problem) cell from that pair's submissions,
/// ordered by creation time.
///
/// Submissions still awaiting a verdict (NoAnswer) are invisible to scoring;
/// everything judged before the first accepted submission counts as a wrong
/// attempt at 20 penalty minutes each.
pub fn compute_cell(contest: &Contest, problem_id: i32, submissions: &[Submission]) -> LeaderboardCell {
    let mut wrong_submissions: u32 = 0;

    for submission in submissions {
        match submission.answer {
            Answer::Accepted => {
                let solve_seconds = (submission.created_at - contest.start_at).num_seconds();
                return LeaderboardCell {
                    problem_id,
                    is_accepted: true,
                    accepted_at: Some(submission.created_at),
                    wrong_submissions,
                    penalty_seconds: solve_seconds
                        + wrong_submissions as i64 * WRONG_SUBMISSION_PENALTY_SECS,
                };
            }
            Answer::NoAnswer => {}
            _ => wrong_submissions += 1,
        }
    }

    LeaderboardCell {
        problem_id,
        is_accepted: false,
        accepted_at: None,
        wrong_submissions,
        penalty_seconds: 0,
    }
}

/// Ranking comparator. Stable total order with descending precedence:
/// score desc, penalty asc, accepted timestamps (most recent first, compared
/// pairwise, earlier ranks higher), contestant name asc, contestant id asc.
pub fn compare_rows(a: &LeaderboardRow, b: &LeaderboardRow) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.penalty.cmp(&b.penalty))
        .then_with(|| {
            let times_a = a.accepted_times_desc();
            let times_b = b.accepted_times_desc();
            for (ta, tb) in times_a.iter().zip(times_b.iter()) {
                match ta.cmp(tb) {
                    Ordering::Equal => continue,
                    decided => return decided,
                }
            }
            Ordering::Equal
        })
        .then_with(|| a.contestant_name.cmp(&b.contestant_name))
        .then_with(|| a.contestant_id.cmp(&b.contestant_id))
}

/// Compute the full leaderboard of a contest.
///
/// `submissions` is the contest's complete submission history, in any order.
/// For the public projection of a frozen contest, submissions at or after the
/// freeze instant are withheld, so the standings stay as of that instant;
/// staff always see current standings.
pub fn compute_contest(
    contest: &Contest,
    problems: &[Problem],
    contestants: &[Contestant],
    submissions: &[Submission],
    projection: Projection,
    now: DateTime<Utc>,
) -> Leaderboard {
    let freeze_cutoff = match projection {
        Projection::Public if contest.is_frozen_at(now) => contest.auto_freeze_at,
        _ => None,
    };

    let mut by_pair: HashMap<(i32, i32), Vec<Submission>> = HashMap::new();
    for submission in submissions {
        if freeze_cutoff.is_some_and(|cutoff| submission.created_at >= cutoff) {
            continue;
        }
        by_pair
            .entry((submission.contestant_id, submission.problem_id))
            .or_default()
            .push(submission.clone());
    }
    for pair in by_pair.values_mut() {
        pair.sort_by_key(|s| (s.created_at, s.id));
    }

    let mut rows: Vec<LeaderboardRow> = contestants
        .iter()
        .map(|contestant| {
            let cells: Vec<LeaderboardCell> = problems
                .iter()
                .map(|problem| {
                    let pair = by_pair
                        .get(&(contestant.id, problem.id))
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    compute_cell(contest, problem.id, pair)
                })
                .collect();

            let mut row = LeaderboardRow {
                contestant_id: contestant.id,
                contestant_name: contestant.name.clone(),
                cells,
                score: 0,
                penalty: 0,
            };
            row.refresh_totals();
            row
        })
        .collect();

    rows.sort_by(compare_rows);

    Leaderboard {
        contest_id: contest.id,
        rows,
    }
}

/// Apply a single-cell update in place and re-rank.
///
/// Cheap relative to a full recomputation: only one row's aggregates change,
/// then the comparator runs over all rows because global order may shift.
/// A stale update referencing an unknown row or cell is tolerated: the board
/// is left unchanged and a diagnostic is logged.
pub fn merge_cell_update(board: &mut Leaderboard, update: &CellUpdate) {
    let Some(row) = board
        .rows
        .iter_mut()
        .find(|r| r.contestant_id == update.contestant_id)
    else {
        warn!(
            contest_id = board.contest_id,
            contestant_id = update.contestant_id,
            "Dropping leaderboard update for unknown contestant"
        );
        return;
    };

    let Some(cell) = row
        .cells
        .iter_mut()
        .find(|c| c.problem_id == update.cell.problem_id)
    else {
        warn!(
            contest_id = board.contest_id,
            contestant_id = update.contestant_id,
            problem_id = update.cell.problem_id,
            "Dropping leaderboard update for unknown problem"
        );
        return;
    };

    cell.is_accepted = update.cell.is_accepted;
    cell.accepted_at = update.cell.accepted_at;
    cell.wrong_submissions = update.cell.wrong_submissions;
    cell.penalty_seconds = update.cell.penalty_seconds;

    row.refresh_totals();
    board.rows.sort_by(compare_rows);
}
