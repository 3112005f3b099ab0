//! 样本生命周期演示程序
//!
//! 展示核心工作流：开单、采集（含耗材扣减）、结果录入与危急值确认、
//! 提交审核、审核发布，以及就诊汇总与待处理队列

use chrono::Utc;
use lims_core::models::{
    CommMethod, ConsumableRequirement, Gender, InventoryItem, Order, Parameter, ParameterKind,
    Patient, RangeScope, ReferenceRange, ResultValue, Sample, Test,
};
use lims_core::TracingNotifier;
use lims_store::{MemoryStore, RecordStore, WriteBatch};
use lims_workflow::WorkflowEngine;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let store = Arc::new(MemoryStore::new());
    let engine = WorkflowEngine::new(store.clone(), Arc::new(TracingNotifier));

    println!("🚀 LIMS 样本生命周期演示\n");

    // 1. 建立目录数据：患者、库存、检验项目、医嘱、样本
    let (order_id, sample_ids, item_id) = seed_catalog(&store).await?;
    println!("✅ 目录数据准备完成 ({} 个样本)", sample_ids.len());

    let item = store.get_inventory_item(item_id).await?;
    println!("   初始库存: {} = {} {}", item.name, item.quantity, item.unit);

    // 2. 采集整批样本，耗材在同一提交中扣减
    let collected = engine.collect(&sample_ids, "王护士", vec![]).await?;
    println!("\n🧪 采集 {} 个样本:", collected.len());
    for sample in &collected {
        println!("   - {} ({:?})", sample.label.as_deref().unwrap_or("-"), sample.status);
    }
    let item = store.get_inventory_item(item_id).await?;
    println!("   采集后库存: {} {}", item.quantity, item.unit);

    // 3. 结果录入：第一个样本录入危急低值
    let mut critical_values = BTreeMap::new();
    critical_values.insert("Glucose".to_string(), ResultValue::Numeric(30.0));
    let flagged = engine.enter_results(sample_ids[0], critical_values).await?;
    println!("\n🚨 样本 {} 检出危急结果 (is_critical = {})",
        flagged.label.as_deref().unwrap_or("-"),
        flagged.is_critical);

    for id in &sample_ids[1..] {
        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Numeric(85.0));
        engine.enter_results(*id, values).await?;
    }
    println!("✅ 全部结果录入完成");

    // 4. 危急值确认
    let pending = engine.critical_tracker().pending().await?;
    println!("\n📞 待确认危急值: {} 个", pending.len());
    let log = engine
        .acknowledge_critical(sample_ids[0], "Dr. Smith", CommMethod::Call, "李技师")
        .await?;
    println!("✅ 危急值已电话通知 {} (记录 {})", log.recipient, log.id);

    // 5. 提交审核并发布
    engine.submit_for_review(&sample_ids).await?;
    let visit = engine.visit(order_id).await?;
    println!("\n📋 就诊状态: {:?} (已分析 {}/{})",
        visit.overall_status, visit.analyzed_count, visit.test_count);

    engine
        .approve(&sample_ids, "张医师", Some("复核无误".to_string()))
        .await?;
    let visit = engine.visit(order_id).await?;
    println!("✅ 审核发布完成, 就诊状态: {:?}", visit.overall_status);

    // 6. 待处理队列（全部发布后应为空）
    let queue = engine.pending_queue().await?;
    println!("\n📊 待处理队列: {} 个就诊", queue.len());

    println!("\n🎉 样本生命周期演示完成!");
    Ok(())
}

/// 建立演示用目录数据
async fn seed_catalog(
    store: &Arc<MemoryStore>,
) -> Result<(Uuid, Vec<Uuid>, Uuid), Box<dyn std::error::Error>> {
    let now = Utc::now();

    let patient = Patient {
        id: Uuid::new_v4(),
        patient_no: "P20260800042".to_string(),
        name: "刘明".to_string(),
        gender: Some(Gender::Male),
        birth_date: chrono::NaiveDate::from_ymd_opt(1984, 3, 12),
        created_at: now,
        updated_at: now,
    };

    let item = InventoryItem {
        id: Uuid::new_v4(),
        name: "真空采血管".to_string(),
        unit: "支".to_string(),
        quantity: 10.0,
        unit_price: 1.5,
        reorder_level: 3.0,
        created_at: now,
        updated_at: now,
    };
    let item_id = item.id;

    let test = Test {
        id: Uuid::new_v4(),
        code: "GLU".to_string(),
        name: "血糖".to_string(),
        parameters: vec![Parameter {
            name: "Glucose".to_string(),
            unit: Some("mg/dL".to_string()),
            kind: ParameterKind::Numeric,
            mandatory: true,
            ranges: vec![ReferenceRange {
                scope: RangeScope::General,
                min: 70.0,
                max: 100.0,
                critical_min: Some(40.0),
                critical_max: Some(500.0),
                safe_min: None,
                safe_max: None,
            }],
        }],
        consumables: vec![ConsumableRequirement { item_id, quantity: 2.0 }],
        created_at: now,
    };

    let order = Order {
        id: Uuid::new_v4(),
        order_no: "ORD-7F3A".to_string(),
        patient_id: patient.id,
        created_at: now,
    };
    let order_id = order.id;

    let mut batch = WriteBatch::new()
        .put_patient(patient)
        .put_inventory_item(item)
        .put_test(test.clone())
        .put_order(order);
    let mut sample_ids = Vec::new();
    for _ in 0..3 {
        // 开单时刻的年龄/性别快照
        let sample = Sample::new(order_id, test.id, 42, Gender::Male, false);
        sample_ids.push(sample.id);
        batch = batch.put_sample(sample);
    }
    store.commit(batch).await?;

    Ok((order_id, sample_ids, item_id))
}
