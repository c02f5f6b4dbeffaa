//! English and Chinese report strings.

#![allow(missing_docs)]

use crate::core::config::{Language, TestMethod};
use crate::report::{FailureReason, ReportKind};

/// Column headers for a report kind, label column first.
#[must_use]
pub const fn headers(kind: ReportKind, lang: Language) -> &'static [&'static str] {
    match (kind, lang) {
        (ReportKind::Dd, Language::En) => &[
            "Test Path",
            "Block Size",
            "Direct Write(IOPS)",
            "Direct Read(IOPS)",
        ],
        (ReportKind::Dd, Language::Zh) => &["测试路径", "块大小", "直接写入(IOPS)", "直接读取(IOPS)"],
        (ReportKind::Fio, Language::En) => &[
            "Test Path",
            "Block",
            "Read(IOPS)",
            "Write(IOPS)",
            "Total(IOPS)",
        ],
        (ReportKind::Fio, Language::Zh) => &[
            "测试路径",
            "块大小",
            "读测试(IOPS)",
            "写测试(IOPS)",
            "总和(IOPS)",
        ],
        (ReportKind::Winsat, Language::En) => &[
            "Test Disk",
            "Random Read[Score]",
            "Sequential Read[Score]",
            "Sequential Write[Score]",
        ],
        (ReportKind::Winsat, Language::Zh) => &[
            "测试的硬盘",
            "随机读取[得分]",
            "顺序读取[得分]",
            "顺序写入[得分]",
        ],
    }
}

#[must_use]
pub const fn failure_label(reason: FailureReason, lang: Language) -> &'static str {
    match (reason, lang) {
        (FailureReason::WriteFailed, Language::En) => "write failed",
        (FailureReason::WriteFailed, Language::Zh) => "写入失败",
        (FailureReason::ReadFailed, Language::En) => "read failed",
        (FailureReason::ReadFailed, Language::Zh) => "读取失败",
        (FailureReason::Unparseable, Language::En) => "unable to parse",
        (FailureReason::Unparseable, Language::Zh) => "无法解析结果",
        (FailureReason::ToolFailed, Language::En) => "test failed",
        (FailureReason::ToolFailed, Language::Zh) => "测试失败",
    }
}

/// Printed instead of a table when a tool cannot be found at all.
#[must_use]
pub const fn tool_unavailable(method: TestMethod, lang: Language) -> &'static str {
    match (method, lang) {
        (TestMethod::Dd, Language::En) => {
            "DD test cannot be performed: dd command not found in system."
        }
        (TestMethod::Dd, Language::Zh) => "无法进行DD测试：系统中未找到dd命令。",
        (TestMethod::Fio, Language::En) => {
            "FIO test cannot be performed: fio command not found in system and embedded binary not available."
        }
        (TestMethod::Fio, Language::Zh) => "无法进行FIO测试：系统中未找到fio命令且无可用的内置版本。",
        (TestMethod::Winsat, Language::En) => {
            "Winsat test cannot be performed: winsat command not found in system."
        }
        (TestMethod::Winsat, Language::Zh) => "无法进行Winsat测试：系统中未找到winsat命令。",
    }
}

/// Preface line when one method is abandoned for another.
#[must_use]
pub const fn switching(from: TestMethod, lang: Language) -> &'static str {
    match (from, lang) {
        (TestMethod::Fio, Language::En) => "Fio test failed, switching to DD for testing.",
        (TestMethod::Fio, Language::Zh) => "FIO测试失败，切换到DD进行测试。",
        (TestMethod::Dd, Language::En) => "DD test failed, switching to Fio for testing.",
        (TestMethod::Dd, Language::Zh) => "DD测试失败，切换到FIO进行测试。",
        (TestMethod::Winsat, Language::En) => "Winsat test failed.",
        (TestMethod::Winsat, Language::Zh) => "Winsat测试失败。",
    }
}

#[must_use]
pub const fn windows_note(lang: Language) -> &'static str {
    match lang {
        Language::En => "Detected host is Windows, using Winsat for testing.",
        Language::Zh => "检测到主机为Windows，使用Winsat进行测试。",
    }
}

/// winsat requested on a host that does not have it.
#[must_use]
pub fn unsupported_method(method: TestMethod, lang: Language) -> String {
    match lang {
        Language::En => format!("Unsupported test method specified: {method}."),
        Language::Zh => format!("不支持的测试方法：{method}。"),
    }
}

#[must_use]
pub const fn no_targets(lang: Language) -> &'static str {
    match lang {
        Language::En => "No testable paths found.",
        Language::Zh => "未找到可测试的路径。",
    }
}

#[must_use]
pub const fn interrupted(lang: Language) -> &'static str {
    match lang {
        Language::En => "Interrupted: results are partial.",
        Language::Zh => "测试被中断：结果不完整。",
    }
}
