//! 历史查询区间切分。

use domain::Interval;

/// 惰性区间序列，由 [`split_interval`] 生成。
#[derive(Debug, Clone)]
pub struct IntervalSplit {
    next_start: i64,
    end: i64,
    step_ms: i64,
    done: bool,
}

/// 将 `[start_ms, end_ms]` 切分为首尾相接、长度不超过
/// `max_read_interval_seconds` 的子区间，最后一段可能更短。
///
/// `max_read_interval_seconds` 为 0 时返回与输入相同的单个区间；
/// `start_ms > end_ms` 时序列为空。
pub fn split_interval(start_ms: i64, end_ms: i64, max_read_interval_seconds: u64) -> IntervalSplit {
    let step_ms = i64::try_from(max_read_interval_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    IntervalSplit {
        next_start: start_ms,
        end: end_ms,
        step_ms,
        done: start_ms > end_ms,
    }
}

impl Iterator for IntervalSplit {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        if self.done {
            return None;
        }
        let remaining = self.end - self.next_start;
        if self.step_ms == 0 || remaining <= self.step_ms {
            self.done = true;
            return Some(Interval::new(self.next_start, self.end));
        }
        let interval = Interval::new(self.next_start, self.next_start + self.step_ms);
        self.next_start = interval.end_ms;
        Some(interval)
    }
}
