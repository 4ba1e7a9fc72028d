use chrono::Utc;
use tenant_tasks_core::cron::CronEvaluator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== CRON求值器演示 ===\n");

    println!("1. 解析标准5字段表达式:");
    let every_minute = CronEvaluator::parse("* * * * *")?;
    let every_five = CronEvaluator::parse("*/5 * * * *")?;
    let daily_2am = CronEvaluator::parse("0 2 * * *")?;
    println!("   每分钟 / 每5分钟 / 每天凌晨2点 全部解析成功");

    let now = Utc::now();
    println!("\n2. 下次执行时间:");
    println!("   当前时间: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(next) = every_minute.next_occurrence(now) {
        println!("   每分钟任务: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(next) = daily_2am.next_occurrence(now) {
        println!("   凌晨2点任务: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    println!("\n3. 即将到来的执行时间:");
    for (i, time) in every_five.upcoming_times(now, 5).iter().enumerate() {
        println!("   第{}次: {}", i + 1, time.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    println!("\n4. 距离下次执行:");
    if let Some(until) = every_five.time_until_next(now) {
        println!("   每5分钟任务还需等待 {} 秒", until.num_seconds());
    }

    println!("\n5. 非法表达式:");
    match CronEvaluator::parse("not a schedule") {
        Ok(_) => println!("   意外解析成功"),
        Err(e) => println!("   解析失败（预期行为）: {e}"),
    }

    Ok(())
}
