use crate::timeq::Cycle;
use crate::traffic::patterns::PatternOp;

pub struct TrafficLogger;

impl TrafficLogger {
    pub fn log_issue(cpu: usize, op: PatternOp, address: u64, outcome: &str, cycle: Cycle) {
        println!(
            "[TRAFFIC] cpu {} {} {:#014x} {} at time {:>10}",
            cpu,
            op.short(),
            address,
            outcome,
            cycle
        );
    }

    pub fn log_cpu_done(cpu: usize, cycle: Cycle) {
        println!("[TRAFFIC] cpu {} all done at time {:>10}", cpu, cycle);
    }
}
