//! crates/sleep_advice_core/src/prompt.rs
//!
//! Builds the instruction prompt sent to the generation provider.

use crate::domain::WeeklyStats;

const PROMPT_HEADER: &str =
    "다음 수면 데이터를 바탕으로 수면 건강에 대한 전문적이고 실용적인 조언을 제공해주세요.";

const PROMPT_CRITERIA: &str = r#"다음 요소들을 고려하여 조언해주세요:
1. 수면 시간의 일관성
2. 권장 수면 시간(성인 기준 7-9시간)과의 비교
3. 수면 패턴의 변화 트렌드
4. 구체적이고 실행 가능한 개선 방안

조언은 친근하면서도 전문적인 톤으로 작성해주세요."#;

/// Renders the advice prompt for a user's weekly statistics.
///
/// The daily average and every `(date, duration)` entry appear in series order.
pub fn advice_prompt(stats: &WeeklyStats) -> String {
    let days = stats
        .series
        .iter()
        .enumerate()
        .map(|(index, day)| {
            format!(
                "  {}일차 ({}): {:.1}시간",
                index + 1,
                day.date.format("%Y-%m-%d"),
                day.duration_hours
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{header}\n\n수면 통계:\n- 일일 평균 수면 시간: {average:.2}시간\n- 최근 7일 수면 기록:\n{days}\n\n{criteria}\n",
        header = PROMPT_HEADER,
        average = stats.daily_average,
        days = days,
        criteria = PROMPT_CRITERIA,
    )
}
