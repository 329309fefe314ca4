//! 协议标识符解析
//!
//! 只做字符串层面的分类，不涉及任何查询。

/// LID 标识符后缀
pub const LID_SUFFIX: &str = "@lid";
/// 手机号标识符后缀
pub const DIRECT_SUFFIX: &str = "@s.whatsapp.net";
/// 旧版手机号标识符后缀
pub const LEGACY_DIRECT_SUFFIX: &str = "@c.us";
/// 群组标识符后缀
pub const GROUP_SUFFIX: &str = "@g.us";

const PHONE_MIN_DIGITS: usize = 10;
const PHONE_MAX_DIGITS: usize = 15;

/// 标识符形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier<'a> {
    /// `<lid>@lid`，携带去掉设备号后的 LID
    Lid(&'a str),
    /// `<phone>@s.whatsapp.net`，携带去掉设备号后的手机号
    Direct(&'a str),
    /// `<creator>-<ts>@g.us`，携带完整标识符和本地部分
    Group { jid: &'a str, local: &'a str },
    /// 无法识别的形态
    Other(&'a str),
}

impl<'a> Identifier<'a> {
    pub fn classify(raw: &'a str) -> Self {
        let raw = raw.trim();
        // 用户部分为空的标识符不可能对应任何身份
        if let Some(user) = raw.strip_suffix(LID_SUFFIX).map(strip_device) {
            if !user.is_empty() {
                return Identifier::Lid(user);
            }
            return Identifier::Other(raw);
        }
        if let Some(user) = raw
            .strip_suffix(DIRECT_SUFFIX)
            .or_else(|| raw.strip_suffix(LEGACY_DIRECT_SUFFIX))
            .map(strip_device)
        {
            if !user.is_empty() {
                return Identifier::Direct(user);
            }
            return Identifier::Other(raw);
        }
        if let Some(local) = raw.strip_suffix(GROUP_SUFFIX) {
            return Identifier::Group { jid: raw, local };
        }
        Identifier::Other(raw)
    }
}

/// 去掉 `:device` 部分（`123:7` → `123`）
pub fn strip_device(user: &str) -> &str {
    user.split(':').next().unwrap_or(user)
}

/// 开头的连续数字
pub fn leading_digits(s: &str) -> Option<&str> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 { None } else { Some(&s[..end]) }
}

/// 非空纯数字
pub fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// 10–15 位纯数字
pub fn is_phone_shaped(s: &str) -> bool {
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_group(raw: &str) -> bool {
    raw.trim().ends_with(GROUP_SUFFIX)
}

pub fn is_lid(raw: &str) -> bool {
    raw.trim().ends_with(LID_SUFFIX)
}

pub fn direct_jid(phone_number: &str) -> String {
    format!("{phone_number}{DIRECT_SUFFIX}")
}

/// 群组本地部分中 `-` 之前的数字（群组创建者手机号）
pub fn group_phone(local: &str) -> Option<&str> {
    let head = local.split('-').next().unwrap_or(local);
    leading_digits(head).filter(|digits| digits.len() == head.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            Identifier::classify("123456789012345@lid"),
            Identifier::Lid("123456789012345")
        );
        assert_eq!(
            Identifier::classify("123456789012345:12@lid"),
            Identifier::Lid("123456789012345")
        );
        assert_eq!(
            Identifier::classify("5511999990000:3@s.whatsapp.net"),
            Identifier::Direct("5511999990000")
        );
        assert_eq!(
            Identifier::classify("5511999990000@c.us"),
            Identifier::Direct("5511999990000")
        );
        assert_eq!(
            Identifier::classify("5511999990000-1600000000@g.us"),
            Identifier::Group {
                jid: "5511999990000-1600000000@g.us",
                local: "5511999990000-1600000000"
            }
        );
        assert_eq!(Identifier::classify("status@broadcast"), Identifier::Other("status@broadcast"));
    }

    #[test]
    fn test_classify_empty_user_part() {
        assert_eq!(Identifier::classify("@s.whatsapp.net"), Identifier::Other("@s.whatsapp.net"));
        assert_eq!(Identifier::classify(":3@c.us"), Identifier::Other(":3@c.us"));
        assert_eq!(Identifier::classify("@lid"), Identifier::Other("@lid"));
    }

    #[test]
    fn test_leading_digits() {
        assert_eq!(leading_digits("5511abc"), Some("5511"));
        assert_eq!(leading_digits("abc"), None);
        assert_eq!(leading_digits(""), None);
    }

    #[test]
    fn test_is_phone_shaped() {
        assert!(is_phone_shaped("5511999990000"));
        assert!(is_phone_shaped("1234567890"));
        assert!(!is_phone_shaped("123456789"));
        assert!(!is_phone_shaped("1234567890123456"));
        assert!(!is_phone_shaped("55119999a0000"));
    }

    #[test]
    fn test_group_phone() {
        assert_eq!(group_phone("5511999990000-1600000000"), Some("5511999990000"));
        assert_eq!(group_phone("120363025246125888"), Some("120363025246125888"));
        assert_eq!(group_phone("abc-123"), None);
    }
}
