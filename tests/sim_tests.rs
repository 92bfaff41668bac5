use dramq::base::behavior::ModuleBehaviors;
use dramq::ui::make_sim;

const HOT: &str = r#"
[sim]
num_cpus = 2
timeout = 200000

[dram]
channels = 2
mapping = "interleaved"
latency = 40
rq_size = 4
wq_size = 4

[traffic]
pattern = "hot"
reqs_per_cpu = 300
issue_per_cycle = 2
max_inflight = 8
write_ratio = 0.3
prefetch_ratio = 0.1
hot_blocks = 24
seed = 11
"#;

#[test]
fn hot_traffic_completes_every_read_once() {
    let mut sim = make_sim(HOT, None).unwrap();
    let report = sim.simulate().unwrap();

    assert!(sim.dram.is_idle());
    let mut cpu_rejects = 0;
    for cpu in &report.per_cpu {
        assert_eq!(cpu.reads_issued + cpu.prefetches_issued + cpu.writes_issued, 300);
        assert_eq!(cpu.completed, cpu.reads_issued + cpu.prefetches_issued);
        assert!(cpu.max_latency <= report.cycles);
        cpu_rejects += cpu.rejects;
    }
    let dram = &report.dram;
    assert_eq!(dram.rq_full_rejects() + dram.wq_full_rejects(), cpu_rejects);
    assert!(dram.reads_merged() + dram.reads_forwarded() > 0);
    assert!(dram.max_rq_occupancy() <= 4);
    assert!(dram.max_wq_occupancy() <= 4);
    assert_eq!(dram.reads_completed(), dram.reads_queued());
    assert_eq!(dram.writes_completed(), dram.writes_queued());
}

#[test]
fn stream_read_latency_is_channel_latency() {
    let toml = r#"
[dram]
channels = 4
mapping = "interleaved"
latency = 100

[traffic]
pattern = "stream"
reqs_per_cpu = 64
write_ratio = 0.0
max_inflight = 4
"#;
    let mut sim = make_sim(toml, None).unwrap();
    let report = sim.simulate().unwrap();
    assert_eq!(report.dram.reads_completed(), 64);
    assert_eq!(report.avg_read_latency, 100.0);
    assert_eq!(report.per_cpu[0].max_latency, 100);
    assert!(report.cycles > 100 * 64 / 4);
}

#[test]
fn warmup_fast_forwards_everything() {
    let toml = r#"
[sim]
warmup_cycles = 1000000

[traffic]
reqs_per_cpu = 50
write_ratio = 0.5
"#;
    let mut sim = make_sim(toml, None).unwrap();
    let report = sim.simulate().unwrap();
    let dram = &report.dram;
    assert_eq!(dram.reads_queued(), 0);
    assert_eq!(dram.writes_queued(), 0);
    assert_eq!(
        dram.reads_fast_forwarded() + dram.writes_fast_forwarded(),
        50
    );
    assert_eq!(report.per_cpu[0].completed, dram.reads_fast_forwarded());
    assert!(report.cycles < 100);
}

#[test]
fn timeout_is_an_error() {
    let toml = r#"
[sim]
timeout = 10

[dram]
latency = 180

[traffic]
reqs_per_cpu = 4
"#;
    let mut sim = make_sim(toml, None).unwrap();
    let err = sim.simulate().unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[test]
fn reset_replays_the_same_run() {
    let toml = r#"
[dram]
latency = 30
rq_size = 8

[traffic]
pattern = "random"
reqs_per_cpu = 200
seed = 3
"#;
    let mut sim = make_sim(toml, None).unwrap();
    let first = sim.simulate().unwrap();
    sim.reset();
    let second = sim.simulate().unwrap();
    assert_eq!(first.cycles, second.cycles);
    assert_eq!(first.dram.reads_merged(), second.dram.reads_merged());
    assert_eq!(first.per_cpu[0].total_latency, second.per_cpu[0].total_latency);
}

#[test]
fn rejected_reads_are_reoffered_with_one_inflight() {
    let toml = r#"
[sim]
num_cpus = 2
timeout = 100000

[dram]
channels = 1
weights = [1]
latency = 20
rq_size = 1
wq_size = 1

[traffic]
pattern = "random"
reqs_per_cpu = 4
max_inflight = 1
write_ratio = 0.0
seed = 9
"#;
    let mut sim = make_sim(toml, None).unwrap();
    let report = sim.simulate().unwrap();

    let mut rejects = 0;
    for cpu in &report.per_cpu {
        assert_eq!(cpu.reads_issued, 4);
        assert_eq!(cpu.completed, 4);
        assert_eq!(cpu.avg_latency, cpu.total_latency as f64 / 4.0);
        rejects += cpu.rejects;
    }
    assert!(rejects > 0);
    assert_eq!(report.dram.rq_full_rejects(), rejects);
    assert!(sim.dram.is_idle());
}
