// Copyright (c)  by Gleb E. Zaslavkiy
//MIT License
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// logging setup shared by the solvers
pub mod Utils;
/// trust region steps for nonlinear least squares
pub mod numerical;
/// linear algebra used by the steps: normal equations solvers and conditioning diagnostics
pub mod somelinalg;
