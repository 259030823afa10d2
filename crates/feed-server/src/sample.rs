//! 데모용 샘플 데이터 생성.
//!
//! 이벤트 엔진이 사용하는 사용자/메시지 샘플 풀을 제공합니다.

use rand::Rng;
use uuid::Uuid;

use feed_core::User;

/// 사용자 이름 풀.
const USERNAMES: &[&str] = &[
    "mina.park",
    "jun.seo",
    "haru_kim",
    "daniel.cho",
    "yuna_lee",
    "felix.kang",
    "sora.jang",
    "leo.yoon",
    "erin_moon",
    "tobi.nam",
    "ari.hwang",
    "noah_shin",
];

/// 이메일 도메인 풀.
const EMAIL_DOMAINS: &[&str] = &["example.com", "mail.example.com", "example.org"];

/// 메시지 본문 풀.
const SENTENCES: &[&str] = &[
    "Did anyone see the deploy finish?",
    "Lunch at noon, usual place.",
    "The dashboard numbers look off again.",
    "Pushing the fix in a minute.",
    "Can someone review my branch?",
    "That meeting could have been an email.",
    "New build is up, please test.",
    "Who broke the staging environment?",
    "Coffee run, anyone?",
    "Logs are clean on my side.",
    "Retrying the job now.",
    "Weekend plans, anyone?",
];

/// 새 샘플 사용자 생성.
///
/// 이름/이메일/아바타는 풀에서 추출하고, 이름 충돌을 피하기 위해
/// 숫자 접미사를 붙입니다. `online`은 생성 시점에 랜덤으로 정해집니다.
pub fn sample_user(rng: &mut impl Rng) -> User {
    let base = USERNAMES[rng.gen_range(0..USERNAMES.len())];
    let suffix: u16 = rng.gen_range(1..1000);
    let name = format!("{}{}", base, suffix);
    let domain = EMAIL_DOMAINS[rng.gen_range(0..EMAIL_DOMAINS.len())];

    User {
        id: Uuid::new_v4(),
        email: format!("{}@{}", name, domain),
        avatar: format!("https://avatars.example.com/u/{}.png", rng.gen_range(0..70)),
        online: rng.gen_bool(0.5),
        name,
    }
}

/// 샘플 메시지 본문 추출.
pub fn sample_sentence(rng: &mut impl Rng) -> String {
    SENTENCES[rng.gen_range(0..SENTENCES.len())].to_string()
}
