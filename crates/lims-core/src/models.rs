//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub patient_no: String,                    // 院内患者编号
    pub name: String,                          // 患者姓名
    pub gender: Option<Gender>,                // 性别
    pub birth_date: Option<chrono::NaiveDate>, // 出生日期
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// 检验项目（目录）
///
/// 一个检验项目由有序的参数列表和采集时消耗的静态耗材需求组成。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: Uuid,
    pub code: String, // 项目代码 (如 CBC, LFT)
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub consumables: Vec<ConsumableRequirement>, // 每次采集的静态耗材需求
    pub created_at: DateTime<Utc>,
}

/// 检验参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub unit: Option<String>,
    pub kind: ParameterKind,
    pub mandatory: bool,                // 必填参数提交时不可为空
    pub ranges: Vec<ReferenceRange>,    // 有序参考范围列表，仅数值参数使用
}

/// 参数值类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ParameterKind {
    Numeric,
    FreeText,
    Dropdown(Vec<String>),
    Boolean,
}

/// 参考范围
///
/// 正常界限为必填，危急界限与安全界限可选。范围可按年龄或性别限定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub scope: RangeScope,
    pub min: f64,
    pub max: f64,
    pub critical_min: Option<f64>,
    pub critical_max: Option<f64>,
    pub safe_min: Option<f64>,
    pub safe_max: Option<f64>,
}

/// 参考范围的适用域
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RangeScope {
    General,
    Gender(Gender),
    Age { min_years: u32, max_years: u32 }, // 闭区间 [min, max]
}

/// 医嘱（一次开单，聚合 N 个样本）
///
/// 医嘱的聚合状态永远由其样本集合实时推导，不作为独立字段存储。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_no: String, // 人工可读的医嘱号
    pub patient_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 样本状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SampleStatus {
    Ordered,   // 已开单，待采集
    Collected, // 已采集
    Analyzing, // 结果录入中
    Review,    // 待审核
    Reported,  // 已发布报告
}

impl std::fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SampleStatus::Ordered => "Ordered",
            SampleStatus::Collected => "Collected",
            SampleStatus::Analyzing => "Analyzing",
            SampleStatus::Review => "Review",
            SampleStatus::Reported => "Reported",
        };
        write!(f, "{}", s)
    }
}

/// 结果严重程度标志
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Flag {
    Normal,
    Low,
    High,
    CriticalLow,
    CriticalHigh,
    Unevaluated, // 未找到匹配的参考范围，区别于确认正常
}

impl Flag {
    /// 是否属于危急值
    pub fn is_critical(&self) -> bool {
        matches!(self, Flag::CriticalLow | Flag::CriticalHigh)
    }
}

/// 单个参数的录入结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterResult {
    pub value: ResultValue,
    pub flag: Flag,
    pub unit: Option<String>,
}

/// 结果值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ResultValue {
    Numeric(f64),
    Text(String),
    Bool(bool),
}

impl ResultValue {
    /// 必填校验意义上的"空值"判断
    pub fn is_empty(&self) -> bool {
        match self {
            ResultValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// 样本（工作单元）
///
/// age_years/gender 是开单时刻的不可变快照，不随患者档案变化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub order_id: Uuid,
    pub test_id: Uuid,
    pub label: Option<String>, // 采集时生成的人工可读样本号
    pub status: SampleStatus,
    pub results: BTreeMap<String, ParameterResult>, // 参数名 -> 结果
    pub is_critical: bool,
    pub is_urgent: bool,
    pub age_years: u32,
    pub gender: Gender,
    pub collected_at: Option<DateTime<Utc>>,
    pub collected_by: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,  // 最近一次结果录入时间
    pub submitted_at: Option<DateTime<Utc>>, // 进入待审核的时间（审核标记）
    pub reported_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub conclusion: Option<String>,
    pub rejection_reason: Option<String>,
    pub recollection_reason: Option<String>,
    pub critical_reported: bool,
    pub critical_reported_at: Option<DateTime<Utc>>,
    pub critical_reported_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sample {
    /// 以开单快照创建一个待采集样本
    pub fn new(order_id: Uuid, test_id: Uuid, age_years: u32, gender: Gender, is_urgent: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            test_id,
            label: None,
            status: SampleStatus::Ordered,
            results: BTreeMap::new(),
            is_critical: false,
            is_urgent,
            age_years,
            gender,
            collected_at: None,
            collected_by: None,
            analyzed_at: None,
            submitted_at: None,
            reported_at: None,
            verified_by: None,
            conclusion: None,
            rejection_reason: None,
            recollection_reason: None,
            critical_reported: false,
            critical_reported_at: None,
            critical_reported_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 库存物品
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub name: String,
    pub unit: String,       // 计量单位 (支/ml/盒)
    pub quantity: f64,      // 当前库存，允许为负
    pub unit_price: f64,
    pub reorder_level: f64, // 低库存告警阈值
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 库存流水类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Deduction, // 采集自动扣减
    Purchase,  // 采购入库
    Issue,     // 手工发放
    Wastage,   // 损耗
    Adjustment,
}

/// 库存流水（台账条目，带符号数量）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub kind: TransactionKind,
    pub quantity: f64,   // 入库为正，出库为负
    pub unit_price: f64, // 记账时刻的单价
    pub cost: f64,       // quantity.abs() * unit_price
    pub sample_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 检验项目的静态耗材需求（每次采集）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumableRequirement {
    pub item_id: Uuid,
    pub quantity: f64,
}

/// 危急值沟通方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommMethod {
    Call,
    Sms,
    Email,
    InPerson,
}

/// 危急值沟通日志（只追加，写入后不可变更）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalCommLog {
    pub id: Uuid,
    pub sample_id: Uuid,
    pub recipient: String,
    pub method: CommMethod,
    pub acknowledged_by: String,
    pub acknowledged_at: DateTime<Utc>,
}
