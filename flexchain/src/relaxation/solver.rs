// FlexChain: Parallelism-Aware Placement of Service Function Chains
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Solver boundary for the linear program

use super::LinearProgram;
use crate::Error;

use good_lp::{
    constraint, minilp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::*;

/// Values of a solved linear program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LpSolution {
    /// Value of every variable, in `[0, 1]`
    pub values: Vec<f64>,
    /// Objective value
    pub objective: f64,
}

/// Trait for solving a [`LinearProgram`]. Any solver for continuous linear programs can be used.
pub trait LpSolver {
    /// Solve the program. The solution must contain one value for every variable, all within
    /// `[0, 1]`.
    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, Error>;
}

/// Pure Rust simplex solver, using `minilp` through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinilpSolver;

impl LpSolver for MinilpSolver {
    fn solve(&self, program: &LinearProgram) -> Result<LpSolution, Error> {
        if program.num_variables() == 0 {
            return Ok(LpSolution::default());
        }

        let mut vars = ProblemVariables::new();
        let x: Vec<Variable> =
            (0..program.num_variables()).map(|_| vars.add(variable().min(0.0).max(1.0))).collect();
        let objective: Expression =
            program.objective.iter().zip(x.iter()).map(|(c, v)| *c * *v).sum();

        let mut problem = vars.maximise(objective).using(minilp);
        for c in program.constraints.iter() {
            let lhs: Expression = c.terms.iter().map(|(i, a)| *a * x[*i]).sum();
            problem.add_constraint(constraint!(lhs <= c.rhs));
        }

        let solution = problem.solve().map_err(|e| match e {
            ResolutionError::Infeasible | ResolutionError::Unbounded => Error::NoSolution,
            e => Error::SolverError(e.to_string()),
        })?;

        let values: Vec<f64> = x.iter().map(|v| solution.value(*v).max(0.0).min(1.0)).collect();
        let objective = program.evaluate(&values);
        debug!("minilp solved the program with objective {}", objective);
        Ok(LpSolution { values, objective })
    }
}

#[cfg(test)]
mod tests {
    use super::super::LinearConstraint;
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn constraint(terms: Vec<(usize, f64)>, rhs: f64) -> LinearConstraint {
        LinearConstraint { name: String::from("c"), terms, rhs }
    }

    #[test]
    fn knapsack_relaxation() {
        // max x0 + x1 + x2, s.t. 2 x0 + x1 + x2 <= 2, x0 + x1 <= 1
        let program = LinearProgram {
            objective: vec![1.0, 1.0, 1.0],
            constraints: vec![
                constraint(vec![(0, 2.0), (1, 1.0), (2, 1.0)], 2.0),
                constraint(vec![(0, 1.0), (1, 1.0)], 1.0),
            ],
        };
        let solution = MinilpSolver.solve(&program).unwrap();
        assert_approx_eq!(solution.objective, 2.0, 1e-6);
        assert_approx_eq!(solution.values[2], 1.0, 1e-6);
        assert!(solution.values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn bounds_are_respected() {
        let program = LinearProgram { objective: vec![1.0, 0.5], constraints: vec![] };
        let solution = MinilpSolver.solve(&program).unwrap();
        assert_approx_eq!(solution.values[0], 1.0, 1e-9);
        assert_approx_eq!(solution.values[1], 1.0, 1e-9);
        assert_approx_eq!(solution.objective, 1.5, 1e-9);
    }

    #[test]
    fn infeasible_program() {
        let program = LinearProgram {
            objective: vec![1.0],
            constraints: vec![constraint(vec![(0, 1.0)], -1.0)],
        };
        assert_eq!(MinilpSolver.solve(&program), Err(Error::NoSolution));
    }

    #[test]
    fn empty_program() {
        let solution = MinilpSolver.solve(&LinearProgram::default()).unwrap();
        assert!(solution.values.is_empty());
        assert_eq!(solution.objective, 0.0);
    }
}
