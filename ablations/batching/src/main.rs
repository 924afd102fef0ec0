//! 批大小消融实验.
//!
//! 同一组切片在不同推理批大小下生成预测网格, 比较耗时, 并检查标签网格是否完全一致.

mod profile;
mod result;
mod runner;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Warn).init() {
        eprintln!("logger init failed: {e}");
    }
    println!("Available cores: {}", utils::cpus());

    let result = match runner::run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ablation failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = result.analyze() {
        eprintln!("cannot write report: {e}");
        return ExitCode::FAILURE;
    }
    if result.invariant() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
